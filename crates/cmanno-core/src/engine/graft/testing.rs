//! In-memory stand-ins for the graft collaborators.

use super::{CorrelationScorer, DensityTransform, Grafter, Refined, Refiner};
use crate::core::density::cell::UnitCell;
use crate::core::density::grid::DensityGrid;
use crate::core::models::atom::Atom;
use crate::core::models::chain::Chain;
use crate::core::models::ids::ResidueKey;
use crate::core::models::residue::Residue;
use crate::core::models::structure::Structure;
use crate::engine::error::EngineError;
use crate::engine::state::{AttachedGraft, GraftTarget};
use nalgebra::Point3;
use ndarray::Array3;
use std::path::Path;
use std::sync::Mutex;

/// Appends one MAN residue, numbered like its target, as a new chain.
pub(crate) struct StubGrafter {
    pub(crate) refuse: Vec<isize>,
}

impl Grafter for StubGrafter {
    fn attach(
        &self,
        structure: &mut Structure,
        target: &GraftTarget,
    ) -> Result<AttachedGraft, EngineError> {
        if self.refuse.contains(&target.seq_num) {
            return Err(EngineError::Attach {
                target: target.key(),
                message: "ring atoms missing".into(),
            });
        }
        let chain_id = structure
            .next_free_chain_id(target.model)
            .ok_or_else(|| EngineError::Internal("out of chain ids".into()))?;
        let mut chain = Chain::new(&chain_id);
        let mut sugar = Residue::new("MAN", target.seq_num).hetero();
        sugar.add_atom(Atom::new("C1", Point3::origin()));
        chain.push_residue(sugar);
        structure.model_or_insert(target.model).push_chain(chain);
        Ok(AttachedGraft {
            target: target.key(),
            receiving_residue: "TRP".into(),
            grafted_chain_id: chain_id.clone(),
            sugars: vec![ResidueKey::new(chain_id, target.seq_num)],
            clashes: Vec::new(),
            average_clash_distance: None,
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingRefiner {
    pub(crate) cycles: Mutex<Vec<u32>>,
    pub(crate) fail: bool,
}

impl Refiner for RecordingRefiner {
    fn refine(
        &self,
        structure: &Structure,
        _mtz: &Path,
        cycles: u32,
        workspace: &Path,
    ) -> Result<Refined, EngineError> {
        self.cycles.lock().unwrap().push(cycles);
        if self.fail {
            return Err(EngineError::Refinement("XYZOUT missing".into()));
        }
        Ok(Refined {
            structure: structure.clone(),
            mtz: workspace.join("refined.mtz"),
        })
    }
}

pub(crate) struct FlatMap;

impl DensityTransform for FlatMap {
    fn compute_map(
        &self,
        _mtz: &Path,
        _amplitude: &str,
        _phase: &str,
        _workspace: &Path,
    ) -> Result<DensityGrid, EngineError> {
        let cell = UnitCell::orthogonal(2.0, 2.0, 2.0).unwrap();
        Ok(DensityGrid::periodic(cell, Array3::zeros((2, 2, 2))).unwrap())
    }
}

pub(crate) struct FnScorer<F>(F);

pub(crate) fn scorer<F>(f: F) -> FnScorer<F>
where
    F: Fn(&Structure, &[ResidueKey]) -> Option<f64>,
{
    FnScorer(f)
}

impl<F> CorrelationScorer for FnScorer<F>
where
    F: Fn(&Structure, &[ResidueKey]) -> Option<f64>,
{
    fn score(
        &self,
        structure: &Structure,
        residues: &[ResidueKey],
        _grid: &DensityGrid,
    ) -> Option<f64> {
        (self.0)(structure, residues)
    }
}
