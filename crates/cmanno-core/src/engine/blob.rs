use super::config::ThresholdPolicy;
use super::error::EngineError;
use super::state::{AnchorPoint, CandidateSite, Occupancy};
use crate::core::density::grid::DensityGrid;
use crate::core::models::structure::Structure;
use nalgebra::Point3;

/// Resolves the occupancy threshold for a structure.
///
/// # Errors
///
/// Returns [`EngineError::MissingResolution`] when a calibrated policy meets a
/// structure without a reported resolution.
pub fn resolve_threshold(
    policy: &ThresholdPolicy,
    structure: &Structure,
) -> Result<f64, EngineError> {
    match policy {
        ThresholdPolicy::Explicit(value) => Ok(*value),
        ThresholdPolicy::Calibrated(calibration) => structure
            .resolution()
            .map(|resolution| calibration.threshold(resolution))
            .ok_or_else(|| EngineError::MissingResolution {
                structure: structure.name.clone(),
            }),
    }
}

/// Mean density inside a sphere, plus the number of grid points it covered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereScore {
    pub mean: f64,
    pub count: usize,
}

/// Scores anchors by the mean density of the grid points within a fixed radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobScorer {
    radius: f64,
}

impl BlobScorer {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Averages the grid values within the sphere around `center`.
    ///
    /// Points are summed in grid-index order, so the result is reproducible for a
    /// fixed grid and center. A sphere that covers no grid point scores zero.
    pub fn score(&self, grid: &DensityGrid, center: &Point3<f64>) -> SphereScore {
        let samples = grid.points_within(center, self.radius);
        if samples.is_empty() {
            return SphereScore {
                mean: 0.0,
                count: 0,
            };
        }
        let sum: f64 = samples.iter().map(|s| s.value as f64).sum();
        SphereScore {
            mean: sum / samples.len() as f64,
            count: samples.len(),
        }
    }

    /// Scores an anchor and classifies it against `threshold`.
    ///
    /// A site is occupied only when its score is strictly greater than the threshold
    /// and the sphere covered at least one grid point.
    pub fn classify(
        &self,
        anchor: &AnchorPoint,
        grid: &DensityGrid,
        threshold: f64,
        window: String,
    ) -> CandidateSite {
        let SphereScore { mean, count } = self.score(grid, &anchor.position);
        let occupancy = if count > 0 && mean > threshold {
            Occupancy::Occupied
        } else {
            Occupancy::Empty
        };
        CandidateSite {
            key: anchor.key.clone(),
            index: anchor.index,
            anchor: anchor.position,
            score: mean,
            sample_count: count,
            threshold,
            occupancy,
            window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::density::cell::UnitCell;
    use crate::core::density::grid::GridBoundary;
    use crate::core::models::ids::{ResidueIndex, ResidueKey};
    use crate::engine::config::ThresholdCalibration;
    use crate::engine::state::Provenance;
    use ndarray::Array3;

    fn grid(value: f32) -> DensityGrid {
        let cell = UnitCell::orthogonal(20.0, 20.0, 20.0).unwrap();
        DensityGrid::new(
            cell,
            [20, 20, 20],
            [0, 0, 0],
            Array3::from_elem((20, 20, 20), value),
            GridBoundary::Bounded,
        )
        .unwrap()
    }

    fn anchor_at(position: Point3<f64>) -> AnchorPoint {
        AnchorPoint {
            key: ResidueKey::new("A", 100),
            index: ResidueIndex::new(0, 0, 0),
            position,
            provenance: Provenance::Geometric,
        }
    }

    #[test]
    fn uniform_grid_scores_its_value() {
        let score = BlobScorer::new(3.0).score(&grid(5.0), &Point3::new(10.0, 10.0, 10.0));
        assert!(score.count > 100);
        assert!((score.mean - 5.0).abs() < 1e-12);
    }

    #[test]
    fn additive_shift_moves_the_score_by_the_same_amount() {
        let center = Point3::new(9.3, 10.2, 10.7);
        let mut base = grid(0.0);
        for (i, value) in base.data_mut().iter_mut().enumerate() {
            *value = ((i * 7919) % 97) as f32 / 13.0;
        }
        let mut shifted = base.clone();
        shifted.data_mut().mapv_inplace(|v| v + 2.5);

        let scorer = BlobScorer::new(3.0);
        let a = scorer.score(&base, &center);
        let b = scorer.score(&shifted, &center);
        assert_eq!(a.count, b.count);
        assert!((b.mean - a.mean - 2.5).abs() < 1e-5);
    }

    #[test]
    fn score_is_reproducible() {
        let scorer = BlobScorer::new(3.0);
        let g = grid(1.25);
        let center = Point3::new(4.4, 5.5, 6.6);
        assert_eq!(scorer.score(&g, &center), scorer.score(&g, &center));
    }

    #[test]
    fn anchor_outside_a_bounded_grid_is_empty() {
        let site = BlobScorer::new(3.0).classify(
            &anchor_at(Point3::new(500.0, 500.0, 500.0)),
            &grid(5.0),
            -1.0,
            String::new(),
        );
        assert_eq!(site.score, 0.0);
        assert_eq!(site.sample_count, 0);
        assert_eq!(site.occupancy, Occupancy::Empty);
    }

    #[test]
    fn occupancy_requires_strictly_greater_score() {
        let scorer = BlobScorer::new(3.0);
        let anchor = anchor_at(Point3::new(10.0, 10.0, 10.0));
        let g = grid(2.0);
        assert!(scorer.classify(&anchor, &g, 1.9, String::new()).is_occupied());
        assert!(!scorer.classify(&anchor, &g, 2.0, String::new()).is_occupied());
    }

    #[test]
    fn calibrated_threshold_needs_a_resolution() {
        let mut structure = Structure::new("1abc");
        let policy = ThresholdPolicy::Calibrated(ThresholdCalibration::GRAFTING);
        assert!(matches!(
            resolve_threshold(&policy, &structure),
            Err(EngineError::MissingResolution { .. })
        ));
        structure.resolution = Some(2.0);
        let threshold = resolve_threshold(&policy, &structure).unwrap();
        assert!((threshold - 0.6662).abs() < 1e-9);
        assert_eq!(
            resolve_threshold(&ThresholdPolicy::Explicit(3.0), &structure).unwrap(),
            3.0
        );
    }
}
