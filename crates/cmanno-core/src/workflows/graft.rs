use crate::core::io::store::PlannedGraft;
use crate::core::models::structure::Structure;
use crate::engine::config::{GraftConfig, MapConfig};
use crate::engine::error::EngineError;
use crate::engine::graft::cycle::{Collaborators, GraftCycle};
use crate::engine::progress::ProgressReporter;
use crate::engine::state::{DonorRef, GraftReport, GraftTarget};
use std::path::Path;
use tracing::{instrument, warn};

/// Resolves stored graft plans against the receiver.
///
/// Plans that name a chain or residue number absent from the first model are logged and
/// skipped.
pub fn targets_from_plan(structure: &Structure, plan: &[PlannedGraft]) -> Vec<GraftTarget> {
    plan.iter()
        .filter_map(|planned| {
            let target = structure.models().first().and_then(|model| {
                model
                    .chains()
                    .iter()
                    .enumerate()
                    .filter(|(_, chain)| chain.id == planned.receiving_chain_index)
                    .find_map(|(chain_index, chain)| {
                        chain
                            .position_of(planned.receiving_res_index)
                            .map(|residue_index| GraftTarget {
                                model: 0,
                                chain_index,
                                chain_id: chain.id.clone(),
                                residue_index,
                                seq_num: planned.receiving_res_index,
                                donor: DonorRef {
                                    path: planned.donor_path.clone(),
                                    glycan_index: planned.glycan_index,
                                },
                            })
                    })
            });
            if target.is_none() {
                warn!(
                    chain = %planned.receiving_chain_index,
                    residue = planned.receiving_res_index,
                    "Planned graft names a residue that is not in the structure; skipping."
                );
            }
            target
        })
        .collect()
}

/// The store representation of a list of targets.
pub fn plan_from_targets(targets: &[GraftTarget]) -> Vec<PlannedGraft> {
    targets
        .iter()
        .map(|t| PlannedGraft {
            donor_path: t.donor.path.clone(),
            glycan_index: t.donor.glycan_index,
            receiving_chain_index: t.chain_id.clone(),
            receiving_res_index: t.seq_num,
        })
        .collect()
}

/// Grafts `targets` onto `structure` and validates them against the data in `mtz`.
///
/// # Errors
///
/// Returns the error of a refinement or map computation; the structure is abandoned.
#[instrument(skip_all, name = "graft_workflow", fields(structure = %structure.name))]
pub fn run(
    structure: Structure,
    targets: &[GraftTarget],
    mtz: &Path,
    workspace: &Path,
    collaborators: Collaborators,
    config: &GraftConfig,
    map: &MapConfig,
    reporter: &ProgressReporter,
) -> Result<GraftReport, EngineError> {
    GraftCycle::new(collaborators, config, &map.rscc_columns).run(
        structure, targets, mtz, workspace, reporter,
    )
}
