use super::{CorrelationScorer, DensityTransform, Grafter, Refiner};
use crate::core::models::ids::ResidueIndex;
use crate::core::models::structure::Structure;
use crate::engine::config::{ColumnPair, GraftConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{GraftOutcome, GraftReport, GraftStatus, GraftTarget};
use std::path::Path;
use tracing::{info, instrument, warn};

/// The external collaborators one graft cycle talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub grafter: &'a dyn Grafter,
    pub refiner: &'a dyn Refiner,
    pub transform: &'a dyn DensityTransform,
    pub scorer: &'a dyn CorrelationScorer,
}

/// Attach, refine, score and prune until every remaining graft fits its density.
///
/// One pass refines the whole structure, recomputes the map from the refined
/// reflections and scores every graft that is still in play. Grafts below the RSCC
/// threshold are excised, and the pruned structure is refined again with the
/// recalculation cycle count. The cycle stops when a pass rejects nothing, or when
/// nothing is left to keep.
pub struct GraftCycle<'a> {
    collaborators: Collaborators<'a>,
    config: &'a GraftConfig,
    columns: &'a ColumnPair,
}

impl<'a> GraftCycle<'a> {
    pub fn new(
        collaborators: Collaborators<'a>,
        config: &'a GraftConfig,
        columns: &'a ColumnPair,
    ) -> Self {
        Self {
            collaborators,
            config,
            columns,
        }
    }

    /// Runs the cycle on `structure`.
    ///
    /// # Arguments
    ///
    /// * `structure` - The receiver; consumed, since it is either returned validated or discarded.
    /// * `targets` - Residues that should receive a glycan.
    /// * `mtz` - Experimental reflection data.
    /// * `workspace` - Directory for per-pass refinement files.
    /// * `reporter` - Progress sink.
    ///
    /// # Errors
    ///
    /// Returns the refinement or map error of the pass that failed; the structure is
    /// abandoned in that case. Failing to attach a single target is not an error.
    #[instrument(skip_all, name = "graft_cycle", fields(targets = targets.len()))]
    pub fn run(
        &self,
        mut structure: Structure,
        targets: &[GraftTarget],
        mtz: &Path,
        workspace: &Path,
        reporter: &ProgressReporter,
    ) -> Result<GraftReport, EngineError> {
        // === Phase 1: Attach ===
        reporter.phase("Attach");
        reporter.report(Progress::TaskStart {
            total: targets.len() as u64,
        });
        let mut outcomes = Vec::with_capacity(targets.len());
        let mut failed_attachments = Vec::new();
        for target in targets {
            match self.collaborators.grafter.attach(&mut structure, target) {
                Ok(graft) => outcomes.push(GraftOutcome::new(graft)),
                Err(e) => {
                    warn!(target = %target.key(), error = %e, "Dropping target that could not be attached.");
                    failed_attachments.push((target.key(), e.to_string()));
                }
            }
            reporter.report(Progress::TaskIncrement { amount: 1 });
        }
        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);

        if outcomes.is_empty() {
            info!("No glycan could be attached; nothing to refine.");
            return Ok(GraftReport {
                outcomes,
                failed_attachments,
                refinement_passes: 0,
                structure: None,
            });
        }

        // === Phase 2: Refine, score and prune ===
        let max_passes = targets.len() + 1;
        let mut passes = 0;
        let mut cycles = self.config.refine_cycles;
        loop {
            if passes == max_passes {
                return Err(EngineError::Internal(format!(
                    "graft cycle did not settle within {max_passes} refinement passes"
                )));
            }
            passes += 1;
            reporter.phase(&format!("Refinement pass {passes}"));

            let pass_dir = workspace.join(format!("pass-{passes}"));
            let refined = self
                .collaborators
                .refiner
                .refine(&structure, mtz, cycles, &pass_dir)?;
            structure = refined.structure;
            let grid = self.collaborators.transform.compute_map(
                &refined.mtz,
                &self.columns.amplitude,
                &self.columns.phase,
                &pass_dir,
            )?;

            let mut doomed: Vec<ResidueIndex> = Vec::new();
            let mut rejected_now = 0;
            for outcome in outcomes
                .iter_mut()
                .filter(|o| o.status != GraftStatus::Rejected)
            {
                let rscc = self
                    .collaborators
                    .scorer
                    .score(&structure, &outcome.graft.sugars, &grid);
                outcome.rscc = rscc;
                outcome.pass = passes;
                if rscc.is_some_and(|r| r >= self.config.rscc_threshold) {
                    outcome.status = GraftStatus::Retained;
                } else {
                    outcome.status = GraftStatus::Rejected;
                    rejected_now += 1;
                    doomed.extend(outcome.graft.sugars.iter().filter_map(|k| structure.locate(k)));
                    info!(target = %outcome.graft.target, rscc = ?rscc, "Rejecting graft.");
                }
            }
            reporter.report(Progress::PhaseFinish);

            if rejected_now == 0 {
                break;
            }
            structure.remove_residues(&doomed);
            structure.prune_empty_chains();

            if !outcomes.iter().any(GraftOutcome::is_retained) {
                info!(passes, "Every graft was rejected; discarding the structure.");
                return Ok(GraftReport {
                    outcomes,
                    failed_attachments,
                    refinement_passes: passes,
                    structure: None,
                });
            }
            cycles = self.config.recalculation_cycles;
        }

        info!(
            passes,
            retained = outcomes.iter().filter(|o| o.is_retained()).count(),
            "Graft cycle settled."
        );
        Ok(GraftReport {
            outcomes,
            failed_attachments,
            refinement_passes: passes,
            structure: Some(structure),
        })
    }
}
