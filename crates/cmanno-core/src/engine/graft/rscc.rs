use super::CorrelationScorer;
use crate::core::density::grid::DensityGrid;
use crate::core::models::atom::Atom;
use crate::core::models::ids::ResidueKey;
use crate::core::models::structure::Structure;
use crate::core::utils::identifiers::electron_count;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::f64::consts::PI;

const DEFAULT_BLUR: f64 = 10.0;
const MIN_B: f64 = 1.0;

/// Pearson correlation coefficient of two equally long samples.
///
/// # Return
///
/// Returns `None` for fewer than three pairs or when either sample has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 3 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// Real-space correlation between a model-derived density and an observed grid.
///
/// Each scored atom contributes an isotropic Gaussian whose height follows its
/// electron count and whose width follows its B-factor plus a blur term. The
/// correlation is taken over the grid points within `mask_radius` of any scored atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDensityRscc {
    mask_radius: f64,
    blur: f64,
}

impl ModelDensityRscc {
    pub fn new(mask_radius: f64) -> Self {
        Self {
            mask_radius,
            blur: DEFAULT_BLUR,
        }
    }

    pub fn with_blur(mut self, blur: f64) -> Self {
        self.blur = blur;
        self
    }

    fn calculated_density(&self, atoms: &[&Atom], point: &Point3<f64>) -> f64 {
        atoms
            .iter()
            .map(|atom| {
                let b = (atom.b_factor + self.blur).max(MIN_B);
                let r2 = (atom.position - point).norm_squared();
                electron_count(&atom.element)
                    * atom.occupancy
                    * (4.0 * PI / b).powf(1.5)
                    * (-4.0 * PI * PI * r2 / b).exp()
            })
            .sum()
    }
}

impl CorrelationScorer for ModelDensityRscc {
    fn score(
        &self,
        structure: &Structure,
        residues: &[ResidueKey],
        grid: &DensityGrid,
    ) -> Option<f64> {
        let atoms: Vec<&Atom> = residues
            .iter()
            .filter_map(|key| structure.locate(key).and_then(|index| structure.residue(index)))
            .flat_map(|residue| residue.atoms().iter().filter(|a| !a.is_hydrogen()))
            .collect();
        if atoms.is_empty() {
            return None;
        }

        let mut mask = BTreeMap::new();
        for atom in &atoms {
            for sample in grid.points_within(&atom.position, self.mask_radius) {
                mask.entry(sample.index)
                    .or_insert((sample.position, sample.value));
            }
        }

        let (calculated, observed): (Vec<f64>, Vec<f64>) = mask
            .values()
            .map(|(position, value)| (self.calculated_density(&atoms, position), *value as f64))
            .unzip();
        pearson(&calculated, &observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::density::cell::UnitCell;
    use crate::core::density::grid::GridBoundary;
    use crate::core::models::chain::Chain;
    use crate::core::models::residue::Residue;
    use ndarray::Array3;

    fn glycan_structure() -> Structure {
        let mut structure = Structure::new("rscc");
        let mut chain = Chain::new("B");
        let mut sugar = Residue::new("MAN", 1).hetero();
        sugar.add_atom(Atom::new("C1", Point3::new(5.0, 5.0, 5.0)));
        sugar.add_atom(Atom::new("O5", Point3::new(6.4, 5.0, 5.0)));
        chain.push_residue(sugar);
        structure.model_or_insert(0).push_chain(chain);
        structure
    }

    fn grid_from(f: impl Fn(&Point3<f64>) -> f64) -> DensityGrid {
        let cell = UnitCell::orthogonal(12.0, 12.0, 12.0).unwrap();
        let n = 24;
        let mut grid = DensityGrid::new(
            cell,
            [n, n, n],
            [0, 0, 0],
            Array3::zeros((n, n, n)),
            GridBoundary::Periodic,
        )
        .unwrap();
        let positions: Vec<_> = (0..n)
            .flat_map(|i| (0..n).flat_map(move |j| (0..n).map(move |k| [i, j, k])))
            .map(|[i, j, k]| {
                let p = grid.grid_point_position([i as isize, j as isize, k as isize]);
                ([i, j, k], f(&p))
            })
            .collect();
        for ([i, j, k], value) in positions {
            grid.data_mut()[[i, j, k]] = value as f32;
        }
        grid
    }

    #[test]
    fn pearson_handles_perfect_and_degenerate_samples() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0, 2.0], &[1.0, 2.0]).is_none());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn model_density_correlates_with_itself() {
        let structure = glycan_structure();
        let scorer = ModelDensityRscc::new(2.0);
        let atoms: Vec<&Atom> = structure
            .residues_iter()
            .flat_map(|(_, _, r)| r.atoms().iter())
            .collect();
        let grid = grid_from(|p| scorer.calculated_density(&atoms, p));

        let rscc = scorer
            .score(&structure, &[ResidueKey::new("B", 1)], &grid)
            .unwrap();
        assert!(rscc > 0.99, "rscc = {rscc}");
    }

    #[test]
    fn inverted_density_anticorrelates() {
        let structure = glycan_structure();
        let scorer = ModelDensityRscc::new(2.0);
        let atoms: Vec<&Atom> = structure
            .residues_iter()
            .flat_map(|(_, _, r)| r.atoms().iter())
            .collect();
        let grid = grid_from(|p| -scorer.calculated_density(&atoms, p));

        let rscc = scorer
            .score(&structure, &[ResidueKey::new("B", 1)], &grid)
            .unwrap();
        assert!(rscc < -0.99, "rscc = {rscc}");
    }

    #[test]
    fn flat_density_or_unknown_residues_are_undefined() {
        let structure = glycan_structure();
        let scorer = ModelDensityRscc::new(2.0);
        let flat = grid_from(|_| 1.0);
        assert!(scorer.score(&structure, &[ResidueKey::new("B", 1)], &flat).is_none());
        let grid = grid_from(|p| p.x);
        assert!(scorer.score(&structure, &[ResidueKey::new("Z", 9)], &grid).is_none());
    }
}
