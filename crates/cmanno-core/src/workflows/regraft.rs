use crate::core::models::ids::{ResidueIndex, ResidueKey};
use crate::core::models::structure::Structure;
use crate::core::utils::identifiers::is_c_mannose;
use crate::engine::config::{GraftConfig, MapConfig};
use crate::engine::error::EngineError;
use crate::engine::graft::cycle::Collaborators;
use crate::engine::progress::ProgressReporter;
use crate::engine::state::{DonorRef, GraftReport, GraftTarget};
use std::path::Path;
use tracing::{info, instrument};

/// Largest C1–CD1 distance still read as a C-glycosidic bond.
pub const C_LINK_DISTANCE: f64 = 1.8;

/// A modelled mannose bonded to a tryptophan ring.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingLink {
    pub sugar: ResidueKey,
    pub sugar_index: ResidueIndex,
    pub tryptophan: ResidueKey,
    pub distance: f64,
}

#[derive(Debug, Clone)]
pub struct RegraftResult {
    /// The links that were stripped before grafting.
    pub removed: Vec<ExistingLink>,
    pub report: GraftReport,
}

/// Finds `MAN`/`BMA` residues whose `C1` lies within [`C_LINK_DISTANCE`] of a `TRP` `CD1`
/// in the same model.
///
/// Each sugar is paired with its nearest tryptophan.
pub fn find_c_links(structure: &Structure) -> Vec<ExistingLink> {
    let rings: Vec<_> = structure
        .residues_iter()
        .filter(|(_, _, r)| r.name == "TRP")
        .filter_map(|(index, chain, r)| {
            r.position_of("CD1")
                .map(|cd1| (index.model, ResidueKey::new(chain.id.clone(), r.seq_num), cd1))
        })
        .collect();

    structure
        .residues_iter()
        .filter(|(_, _, r)| is_c_mannose(&r.name))
        .filter_map(|(index, chain, sugar)| {
            let c1 = sugar.position_of("C1")?;
            rings
                .iter()
                .filter(|(model, _, _)| *model == index.model)
                .map(|(_, key, cd1)| (key, (cd1 - c1).norm()))
                .filter(|(_, d)| *d <= C_LINK_DISTANCE)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(key, distance)| ExistingLink {
                    sugar: ResidueKey::new(chain.id.clone(), sugar.seq_num),
                    sugar_index: index,
                    tryptophan: key.clone(),
                    distance,
                })
        })
        .collect()
}

/// Deletes the linked sugars and returns one target per distinct tryptophan.
///
/// Targets are resolved after the deletion, so their positions are valid for the
/// stripped structure.
pub fn strip_links(
    structure: &mut Structure,
    links: &[ExistingLink],
    donor: &DonorRef,
) -> Vec<GraftTarget> {
    let doomed: Vec<ResidueIndex> = links.iter().map(|l| l.sugar_index).collect();
    structure.remove_residues(&doomed);
    structure.prune_empty_chains();

    let mut seen: Vec<&ResidueKey> = Vec::new();
    let mut targets = Vec::new();
    for link in links {
        if seen.contains(&&link.tryptophan) {
            continue;
        }
        seen.push(&link.tryptophan);
        if let Some(index) = structure.locate(&link.tryptophan) {
            targets.push(GraftTarget {
                model: index.model,
                chain_index: index.chain,
                chain_id: link.tryptophan.chain_id.clone(),
                residue_index: index.residue,
                seq_num: link.tryptophan.seq_num,
                donor: donor.clone(),
            });
        }
    }
    targets
}

/// Replaces existing C-mannoses with freshly grafted glycans and validates them.
///
/// # Errors
///
/// Returns the error of a refinement or map computation; the structure is abandoned.
#[instrument(skip_all, name = "regraft_workflow", fields(structure = %structure.name))]
pub fn run(
    mut structure: Structure,
    mtz: &Path,
    workspace: &Path,
    donor: &DonorRef,
    collaborators: Collaborators,
    config: &GraftConfig,
    map: &MapConfig,
    reporter: &ProgressReporter,
) -> Result<RegraftResult, EngineError> {
    let removed = find_c_links(&structure);
    let targets = strip_links(&mut structure, &removed, donor);
    info!(
        sugars = removed.len(),
        tryptophans = targets.len(),
        "Stripped existing C-mannoses."
    );
    let report = super::graft::run(
        structure,
        &targets,
        mtz,
        workspace,
        collaborators,
        config,
        map,
        reporter,
    )?;
    Ok(RegraftResult { removed, report })
}
