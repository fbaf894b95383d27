use crate::core::density::grid::DensityGrid;
use crate::core::models::structure::Structure;
use crate::engine::blob::{BlobScorer, resolve_threshold};
use crate::engine::config::DetectionConfig;
use crate::engine::consensus::{ConsensusMatcher, SequonFilter, residue_window};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::reconcile::reconcile;
use crate::engine::state::{CandidateSite, DonorRef, GraftTarget, SequenceMotifHit};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Occupancy threshold applied to every candidate.
    pub threshold: f64,
    /// Every anchor that passed the sequence-context filter, occupied or not.
    pub candidates: Vec<CandidateSite>,
    pub hits: Vec<SequenceMotifHit>,
    pub targets: Vec<GraftTarget>,
}

impl DetectionResult {
    pub fn occupied(&self) -> impl Iterator<Item = &CandidateSite> {
        self.candidates.iter().filter(|c| c.is_occupied())
    }
}

/// Finds the residues of `structure` that carry unmodelled density at their anchor and
/// match the sequence motif.
///
/// # Arguments
///
/// * `structure` - The receiver; only its first model is inspected.
/// * `grid` - Normalized difference density.
/// * `config` - Threshold policy, sphere radius, anchor geometry and sequence patterns.
/// * `donor` - Donor glycan assigned to every target.
/// * `reporter` - Progress sink.
///
/// # Errors
///
/// Returns an error for an invalid pattern, or when a calibrated threshold is requested
/// for a structure without a resolution. Finding nothing is not an error.
#[instrument(skip_all, name = "detection_workflow", fields(structure = %structure.name))]
pub fn run(
    structure: &Structure,
    grid: &DensityGrid,
    config: &DetectionConfig,
    donor: &DonorRef,
    reporter: &ProgressReporter,
) -> Result<DetectionResult, EngineError> {
    // === Phase 1: Candidate anchors ===
    reporter.phase("Blob search");
    let threshold = resolve_threshold(&config.threshold, structure)?;
    let sequon = config
        .sequon
        .as_deref()
        .map(|pattern| SequonFilter::new(pattern, config.half_window))
        .transpose()?;
    let scorer = BlobScorer::new(config.sphere_radius);

    let anchors = config.anchor.anchors(structure);
    reporter.report(Progress::TaskStart {
        total: anchors.len() as u64,
    });
    let mut candidates = Vec::with_capacity(anchors.len());
    for anchor in &anchors {
        reporter.report(Progress::TaskIncrement { amount: 1 });
        let Some(chain) = structure.chain(anchor.index.model, anchor.index.chain) else {
            continue;
        };
        let window = residue_window(chain, anchor.key.seq_num, config.half_window);
        if let Some(filter) = &sequon {
            if !filter.accepts(&window) {
                debug!(residue = %anchor.key, window = %window, "Sequence context rejected.");
                continue;
            }
        }
        candidates.push(scorer.classify(anchor, grid, threshold, window));
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Sequence motif and reconciliation ===
    reporter.phase("Reconciliation");
    let hits = ConsensusMatcher::new(&config.motif)?.hits(structure);
    let targets = reconcile(structure, &candidates, &hits, donor);
    reporter.report(Progress::PhaseFinish);

    info!(
        threshold,
        anchors = anchors.len(),
        candidates = candidates.len(),
        occupied = candidates.iter().filter(|c| c.is_occupied()).count(),
        targets = targets.len(),
        "Detection complete."
    );
    Ok(DetectionResult {
        threshold,
        candidates,
        hits,
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::density::cell::UnitCell;
    use crate::core::models::atom::Atom;
    use crate::core::models::chain::Chain;
    use crate::core::models::residue::Residue;
    use crate::engine::config::{
        DEFAULT_MOTIF, DEFAULT_SPHERE_RADIUS, DetectionConfigBuilder, ThresholdCalibration,
        ThresholdPolicy,
    };
    use nalgebra::Point3;
    use ndarray::Array3;
    use std::path::PathBuf;

    /// Chain A numbered 94..=110, alanines apart from a W-x-x-W motif at 100.
    /// Only TRP 100 carries ring atoms, so it is the single anchor.
    fn structure() -> Structure {
        let mut structure = Structure::new("motif");
        let mut chain = Chain::new("A");
        for n in 94..=110 {
            let name = if n == 100 || n == 103 { "TRP" } else { "ALA" };
            let mut residue = Residue::new(name, n);
            residue.add_atom(Atom::new("CA", Point3::new(n as f64 * 0.1, 0.0, 0.0)));
            if n == 100 {
                residue.add_atom(Atom::new("CD1", Point3::new(5.0, 5.0, 5.0)));
                residue.add_atom(Atom::new("CE3", Point3::new(4.0, 5.0, 5.0)));
            }
            chain.push_residue(residue);
        }
        structure.model_or_insert(0).push_chain(chain);
        structure
    }

    fn uniform_grid(value: f32) -> DensityGrid {
        let cell = UnitCell::orthogonal(20.0, 20.0, 20.0).unwrap();
        DensityGrid::periodic(cell, Array3::from_elem((20, 20, 20), value)).unwrap()
    }

    fn config(threshold: ThresholdPolicy) -> DetectionConfig {
        DetectionConfigBuilder::new()
            .threshold(threshold)
            .sphere_radius(DEFAULT_SPHERE_RADIUS)
            .motif(DEFAULT_MOTIF)
            .build()
            .unwrap()
    }

    fn donor() -> DonorRef {
        DonorRef {
            path: PathBuf::from("donor.pdb"),
            glycan_index: 0,
        }
    }

    #[test]
    fn dense_anchor_with_motif_yields_single_target() {
        let result = run(
            &structure(),
            &uniform_grid(5.0),
            &config(ThresholdPolicy::Explicit(2.0)),
            &donor(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].window, "AAAAAAWAAWAAA");
        assert!((result.candidates[0].score - 5.0).abs() < 1e-9);
        assert_eq!(result.targets.len(), 1);
        assert_eq!(result.targets[0].chain_id, "A");
        assert_eq!(result.targets[0].seq_num, 100);
        assert_eq!(result.targets[0].residue_index, 6);
    }

    #[test]
    fn raising_the_threshold_leaves_no_target() {
        let result = run(
            &structure(),
            &uniform_grid(5.0),
            &config(ThresholdPolicy::Explicit(10.0)),
            &donor(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.occupied().count(), 0);
        assert!(result.targets.is_empty());
    }

    #[test]
    fn anchors_outside_the_sequon_are_not_scored() {
        let mut structure = structure();
        // Break the second tryptophan of the motif.
        structure.model_or_insert(0).chains_mut()[0].residues_mut()[9].name = "ALA".into();

        let result = run(
            &structure,
            &uniform_grid(5.0),
            &config(ThresholdPolicy::Explicit(2.0)),
            &donor(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!(result.candidates.is_empty());
        assert!(result.targets.is_empty());
    }

    #[test]
    fn calibrated_threshold_requires_resolution() {
        let err = run(
            &structure(),
            &uniform_grid(5.0),
            &config(ThresholdPolicy::Calibrated(ThresholdCalibration::GRAFTING)),
            &donor(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MissingResolution { .. }));

        let mut resolved = structure();
        resolved.resolution = Some(2.0);
        let result = run(
            &resolved,
            &uniform_grid(5.0),
            &config(ThresholdPolicy::Calibrated(ThresholdCalibration::GRAFTING)),
            &donor(),
            &ProgressReporter::new(),
        )
        .unwrap();
        let expected = ThresholdCalibration::GRAFTING.threshold(2.0);
        assert!((result.threshold - expected).abs() < 1e-12);
        assert_eq!(result.targets.len(), 1);
    }
}
