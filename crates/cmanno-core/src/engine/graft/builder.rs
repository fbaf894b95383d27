use super::Grafter;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::chain::Chain;
use crate::core::models::ids::ResidueKey;
use crate::core::models::residue::Residue;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::superposition;
use crate::engine::config::GraftConfig;
use crate::engine::error::EngineError;
use crate::engine::state::{AttachedGraft, GraftTarget};
use crate::engine::tasks::clash_detection::find_clashes;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TRP_RING_ATOMS: [&str; 9] = [
    "CG", "CD1", "CD2", "NE1", "CE2", "CE3", "CZ2", "CZ3", "CH2",
];

/// Rigid-body glycan builder.
///
/// The donor file holds a tryptophan carrying one or more glycans. Each attach
/// superposes the donor tryptophan ring onto the receiving residue, moves the chosen
/// glycan with it, checks it for clashes against the receiver and appends the surviving
/// sugars as a new chain.
pub struct RigidGrafter {
    clash_distance: f64,
    remove_on_clash: bool,
    trim_on_clash: bool,
    pool: ThreadPool,
    donors: HashMap<PathBuf, Structure>,
}

impl RigidGrafter {
    pub fn new(config: &GraftConfig) -> Result<Self, EngineError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads.pool_size())
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build clash-search pool: {e}")))?;
        Ok(Self {
            clash_distance: config.clash_distance,
            remove_on_clash: config.remove_on_clash,
            trim_on_clash: config.trim_on_clash,
            pool,
            donors: HashMap::new(),
        })
    }

    /// Registers an already loaded donor under `path`, so it is not read from disk.
    pub fn with_donor(mut self, path: impl Into<PathBuf>, donor: Structure) -> Self {
        self.donors.insert(path.into(), donor);
        self
    }

    fn donor(&self, path: &Path) -> Result<Cow<'_, Structure>, EngineError> {
        if let Some(donor) = self.donors.get(path) {
            return Ok(Cow::Borrowed(donor));
        }
        PdbFile::read_from_path(path)
            .map(Cow::Owned)
            .map_err(|source| EngineError::ModelRead {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Splits a donor into its tryptophan and the requested glycan.
fn donor_parts(donor: &Structure, glycan_index: usize) -> Result<(&Residue, Vec<&Residue>), String> {
    let model = donor
        .models()
        .first()
        .ok_or_else(|| "donor has no model".to_string())?;
    let anchor = model
        .chains()
        .iter()
        .flat_map(|c| c.residues())
        .find(|r| r.name == "TRP")
        .ok_or_else(|| "donor has no tryptophan".to_string())?;
    let mut glycans = model.chains().iter().filter_map(|chain| {
        let sugars: Vec<&Residue> = chain
            .residues()
            .iter()
            .filter(|r| !r.is_amino_acid() && !r.is_water())
            .collect();
        (!sugars.is_empty()).then_some(sugars)
    });
    let sugars = glycans
        .nth(glycan_index)
        .ok_or_else(|| format!("donor has no glycan with index {glycan_index}"))?;
    Ok((anchor, sugars))
}

fn residue_label(chain_id: &str, residue: &Residue) -> String {
    format!("{}/{} {}", chain_id, residue.seq_num, residue.name)
}

impl Grafter for RigidGrafter {
    fn attach(
        &self,
        structure: &mut Structure,
        target: &GraftTarget,
    ) -> Result<AttachedGraft, EngineError> {
        let key = target.key();
        let fail = |message: String| EngineError::Attach {
            target: key.clone(),
            message,
        };

        let receiving = structure
            .residue(target.index())
            .filter(|r| r.seq_num == target.seq_num)
            .ok_or_else(|| fail("target residue is not in the structure".into()))?;
        let receiving_name = receiving.name.clone();

        let donor = self.donor(&target.donor.path)?;
        let (donor_anchor, donor_sugars) =
            donor_parts(&donor, target.donor.glycan_index).map_err(&fail)?;

        let (from, to): (Vec<_>, Vec<_>) = TRP_RING_ATOMS
            .iter()
            .filter_map(|name| Some((donor_anchor.position_of(name)?, receiving.position_of(name)?)))
            .unzip();
        if from.len() < 3 {
            return Err(fail(format!(
                "only {} ring atoms shared with the donor tryptophan",
                from.len()
            )));
        }
        let (rotation, translation) =
            superposition(&from, &to).ok_or_else(|| fail("ring superposition failed".into()))?;

        let mut placed: Vec<Residue> = donor_sugars
            .iter()
            .map(|&sugar| {
                let mut sugar = sugar.clone();
                for atom in sugar.atoms_mut() {
                    atom.position = rotation * atom.position + translation;
                }
                sugar
            })
            .collect();

        // === Clash search against the receiver ===
        let mut receiver_points = Vec::new();
        let mut receiver_labels = Vec::new();
        for (index, chain, residue) in structure.residues_iter() {
            if index.model != target.model || index == target.index() || residue.is_water() {
                continue;
            }
            for atom in residue.atoms().iter().filter(|a| !a.is_hydrogen()) {
                receiver_points.push([atom.position.x, atom.position.y, atom.position.z]);
                receiver_labels.push(residue_label(&chain.id, residue));
            }
        }
        let mut probe_owner = Vec::new();
        let mut probe_points = Vec::new();
        for (sugar_index, sugar) in placed.iter().enumerate() {
            for atom in sugar.atoms().iter().filter(|a| !a.is_hydrogen()) {
                probe_owner.push(sugar_index);
                probe_points.push([atom.position.x, atom.position.y, atom.position.z]);
            }
        }
        let contacts = self.pool.install(|| {
            find_clashes(&receiver_points, &probe_points, self.clash_distance)
        });

        let first_clashing = contacts.iter().map(|c| probe_owner[c.probe]).min();
        let keep = match first_clashing {
            Some(_) if self.remove_on_clash => {
                return Err(fail(format!("{} clashing contacts", contacts.len())));
            }
            Some(first) if self.trim_on_clash => first,
            _ => placed.len(),
        };
        if keep == 0 {
            return Err(fail("every sugar clashes with the receiver".into()));
        }
        placed.truncate(keep);

        let kept_contacts: Vec<_> = contacts
            .iter()
            .filter(|c| probe_owner[c.probe] < keep)
            .collect();
        let clashes: Vec<String> = kept_contacts
            .iter()
            .map(|c| receiver_labels[c.receiver].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let average_clash_distance = (!kept_contacts.is_empty()).then(|| {
            kept_contacts.iter().map(|c| c.distance).sum::<f64>() / kept_contacts.len() as f64
        });

        // === Append the glycan as a new chain ===
        let chain_id = structure
            .next_free_chain_id(target.model)
            .ok_or_else(|| fail("no free chain identifier left".into()))?;
        let mut chain = Chain::new(&chain_id);
        let mut sugars = Vec::with_capacity(placed.len());
        for (i, mut sugar) in placed.into_iter().enumerate() {
            sugar.seq_num = i as isize + 1;
            sugar.ins_code = None;
            sugar.het = true;
            sugars.push(ResidueKey::new(chain_id.clone(), sugar.seq_num));
            chain.push_residue(sugar);
        }
        structure.model_or_insert(target.model).push_chain(chain);

        debug!(target = %key, contacts = kept_contacts.len(), "Clash search applied.");
        info!(
            target = %key,
            glycan_chain = %chain_id,
            sugars = sugars.len(),
            clashes = clashes.len(),
            "Attached glycan."
        );
        Ok(AttachedGraft {
            target: key,
            receiving_residue: receiving_name,
            grafted_chain_id: chain_id,
            sugars,
            clashes,
            average_clash_distance,
        })
    }
}
