//! Collaborators of the graft cycle and the cycle itself.
//!
//! The cycle only talks to its collaborators through the traits defined here, so each
//! one can be replaced: [`builder::RigidGrafter`] inserts glycans,
//! [`refine::RefmacRefiner`] refines against the experimental data,
//! [`transform::GemmiTransform`] turns map coefficients into a grid and
//! [`rscc::ModelDensityRscc`] scores the fit of a graft.

use super::error::EngineError;
use super::state::{AttachedGraft, GraftTarget};
use crate::core::density::grid::DensityGrid;
use crate::core::models::ids::ResidueKey;
use crate::core::models::structure::Structure;
use std::path::{Path, PathBuf};

pub mod builder;
pub mod cycle;
pub mod refine;
pub mod rscc;
#[cfg(test)]
pub(crate) mod testing;
pub mod transform;

/// Inserts a donor glycan at a target residue.
pub trait Grafter {
    /// Attaches the glycan, mutating `structure`.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving `structure` untouched, when the target cannot receive
    /// the glycan or the clash policy rejects it.
    fn attach(
        &self,
        structure: &mut Structure,
        target: &GraftTarget,
    ) -> Result<AttachedGraft, EngineError>;
}

/// Output of one refinement run.
#[derive(Debug, Clone)]
pub struct Refined {
    pub structure: Structure,
    /// Reflection file with the recalculated map coefficients.
    pub mtz: PathBuf,
}

/// Refines a model against experimental reflection data.
pub trait Refiner {
    /// Refines `structure` against `mtz` for `cycles` cycles, using `workspace` for
    /// every file it writes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Refinement`] when the run leaves no refined output.
    fn refine(
        &self,
        structure: &Structure,
        mtz: &Path,
        cycles: u32,
        workspace: &Path,
    ) -> Result<Refined, EngineError>;
}

/// Computes a density grid from the map coefficients stored in a reflection file.
pub trait DensityTransform {
    fn compute_map(
        &self,
        mtz: &Path,
        amplitude: &str,
        phase: &str,
        workspace: &Path,
    ) -> Result<DensityGrid, EngineError>;
}

/// Scores how well a set of residues fits a density grid.
pub trait CorrelationScorer {
    /// Returns `None` when the correlation is undefined.
    fn score(
        &self,
        structure: &Structure,
        residues: &[ResidueKey],
        grid: &DensityGrid,
    ) -> Option<f64>;
}
