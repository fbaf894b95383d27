use super::chain::Chain;
use super::ids::{ResidueIndex, ResidueKey};
use super::residue::Residue;
use crate::core::density::cell::UnitCell;
use crate::core::utils::identifiers::one_letter_code;
use std::collections::BTreeMap;

/// One model of a structure: an ordered list of chains.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub serial: usize,
    pub(crate) chains: Vec<Chain>,
}

impl Model {
    pub fn new(serial: usize) -> Self {
        Self {
            serial,
            chains: Vec::new(),
        }
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chains_mut(&mut self) -> &mut [Chain] {
        &mut self.chains
    }

    /// Appends a chain and returns its position within the model.
    pub fn push_chain(&mut self, chain: Chain) -> usize {
        self.chains.push(chain);
        self.chains.len() - 1
    }

    pub fn chain_index(&self, chain_id: &str) -> Option<usize> {
        self.chains.iter().position(|c| c.id == chain_id)
    }
}

/// A crystal structure: models, chains, residues and atoms plus the experimental
/// metadata the pipeline needs (resolution, unit cell and reference sequences).
///
/// Residues are stored in plain vectors, so a [`ResidueIndex`] addresses a residue by
/// position. Positions shift when residues are removed, which is why bulk deletion
/// goes through [`Structure::remove_residues`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    /// Identifier of the structure, usually the PDB code or file stem.
    pub name: String,
    /// Resolution in Angstroms as reported by the data source.
    pub resolution: Option<f64>,
    /// Crystallographic unit cell, if the file carried one.
    pub cell: Option<UnitCell>,
    /// Hermann-Mauguin space group symbol.
    pub space_group: Option<String>,
    /// Three-letter reference sequences (SEQRES) keyed by chain identifier.
    pub(crate) sequences: BTreeMap<String, Vec<String>>,
    pub(crate) models: Vec<Model>,
}

impl Structure {
    /// Creates an empty structure with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Returns the reported resolution in Angstroms.
    ///
    /// # Return
    ///
    /// Returns `None` when the source did not report a resolution.
    pub fn resolution(&self) -> Option<f64> {
        self.resolution
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [Model] {
        &mut self.models
    }

    /// Appends a model and returns its position.
    pub fn push_model(&mut self, model: Model) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }

    /// Returns the model at `index`, creating empty models up to it if needed.
    pub fn model_or_insert(&mut self, index: usize) -> &mut Model {
        while self.models.len() <= index {
            let serial = self.models.len() + 1;
            self.models.push(Model::new(serial));
        }
        &mut self.models[index]
    }

    /// Retrieves a residue by its positional index.
    ///
    /// # Arguments
    ///
    /// * `index` - The model/chain/residue position.
    ///
    /// # Return
    ///
    /// Returns `Some(&Residue)` if every component of the index is in range.
    pub fn residue(&self, index: ResidueIndex) -> Option<&Residue> {
        self.models
            .get(index.model)?
            .chains
            .get(index.chain)?
            .residues
            .get(index.residue)
    }

    pub fn residue_mut(&mut self, index: ResidueIndex) -> Option<&mut Residue> {
        self.models
            .get_mut(index.model)?
            .chains
            .get_mut(index.chain)?
            .residues
            .get_mut(index.residue)
    }

    pub fn chain(&self, model: usize, chain: usize) -> Option<&Chain> {
        self.models.get(model)?.chains.get(chain)
    }

    /// Iterates over every residue with its index and owning chain.
    pub fn residues_iter(&self) -> impl Iterator<Item = (ResidueIndex, &Chain, &Residue)> {
        self.models.iter().enumerate().flat_map(|(m, model)| {
            model.chains.iter().enumerate().flat_map(move |(c, chain)| {
                chain
                    .residues
                    .iter()
                    .enumerate()
                    .map(move |(r, residue)| (ResidueIndex::new(m, c, r), chain, residue))
            })
        })
    }

    /// Finds a residue by its stable key inside one model.
    ///
    /// # Arguments
    ///
    /// * `model` - The model position to search.
    /// * `key` - Chain identifier and author sequence number.
    ///
    /// # Return
    ///
    /// Returns the first matching residue index, or `None`.
    pub fn find_residue(&self, model: usize, key: &ResidueKey) -> Option<ResidueIndex> {
        let model_ref = self.models.get(model)?;
        model_ref
            .chains
            .iter()
            .enumerate()
            .filter(|(_, chain)| chain.id == key.chain_id)
            .find_map(|(c, chain)| {
                chain
                    .position_of(key.seq_num)
                    .map(|r| ResidueIndex::new(model, c, r))
            })
    }

    /// Finds a residue by key in the first model that holds it.
    pub fn locate(&self, key: &ResidueKey) -> Option<ResidueIndex> {
        (0..self.models.len()).find_map(|model| self.find_residue(model, key))
    }

    pub fn atom_count(&self) -> usize {
        self.residues_iter().map(|(_, _, r)| r.atoms.len()).sum()
    }

    /// Removes a single residue, shifting the residues after it in the same chain.
    ///
    /// # Return
    ///
    /// Returns the removed residue, or `None` if the index is out of range.
    pub fn remove_residue(&mut self, index: ResidueIndex) -> Option<Residue> {
        let chain = self
            .models
            .get_mut(index.model)?
            .chains
            .get_mut(index.chain)?;
        if index.residue >= chain.residues.len() {
            return None;
        }
        Some(chain.residues.remove(index.residue))
    }

    /// Removes every addressed residue.
    ///
    /// Indices are sorted by `(residue, chain, model)` and deleted in descending
    /// order, so each removal only shifts residues that are already gone. Duplicates
    /// are removed once. Chains are kept even when they end up empty; call
    /// [`Structure::prune_empty_chains`] afterwards.
    ///
    /// # Return
    ///
    /// Returns the removed residues in deletion order.
    pub fn remove_residues(&mut self, indices: &[ResidueIndex]) -> Vec<Residue> {
        let mut ordered: Vec<ResidueIndex> = indices.to_vec();
        ordered.sort_by_key(|i| std::cmp::Reverse(i.deletion_key()));
        ordered.dedup();
        ordered
            .into_iter()
            .filter_map(|index| self.remove_residue(index))
            .collect()
    }

    /// Drops chains that no longer contain residues.
    pub fn prune_empty_chains(&mut self) {
        for model in &mut self.models {
            model.chains.retain(|c| !c.is_empty());
        }
    }

    /// Returns the first single-letter chain identifier not used in `model`.
    pub fn next_free_chain_id(&self, model: usize) -> Option<String> {
        let used: Vec<&str> = self
            .models
            .get(model)
            .map(|m| m.chains.iter().map(|c| c.id.as_str()).collect())
            .unwrap_or_default();
        ('A'..='Z')
            .chain('a'..='z')
            .chain('0'..='9')
            .map(|c| c.to_string())
            .find(|id| !used.contains(&id.as_str()))
    }

    pub fn set_reference_sequence(&mut self, chain_id: &str, residues: Vec<String>) {
        self.sequences.insert(chain_id.to_string(), residues);
    }

    pub fn reference_sequences(&self) -> &BTreeMap<String, Vec<String>> {
        &self.sequences
    }

    /// One-letter reference sequence for a chain, from SEQRES when available.
    ///
    /// Unknown residue names map to `X`.
    pub fn reference_sequence(&self, chain_id: &str) -> Option<String> {
        self.sequences.get(chain_id).map(|names| {
            names
                .iter()
                .map(|n| one_letter_code(n).unwrap_or('X'))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    fn structure_with_chain(names: &[&str]) -> Structure {
        let mut structure = Structure::new("test");
        let mut chain = Chain::new("A");
        for (i, name) in names.iter().enumerate() {
            let mut residue = Residue::new(name, i as isize + 1);
            residue.add_atom(Atom::new("CA", Point3::new(i as f64, 0.0, 0.0)));
            chain.push_residue(residue);
        }
        structure.model_or_insert(0).push_chain(chain);
        structure
    }

    fn names(structure: &Structure) -> Vec<String> {
        structure
            .residues_iter()
            .map(|(_, _, r)| r.name.clone())
            .collect()
    }

    #[test]
    fn residue_lookup_by_index_and_key() {
        let structure = structure_with_chain(&["ALA", "TRP", "GLY"]);
        let index = structure
            .find_residue(0, &ResidueKey::new("A", 2))
            .unwrap();
        assert_eq!(index, ResidueIndex::new(0, 0, 1));
        assert_eq!(structure.residue(index).unwrap().name, "TRP");
        assert!(structure.residue(ResidueIndex::new(0, 0, 9)).is_none());
        assert!(structure.find_residue(0, &ResidueKey::new("B", 2)).is_none());
    }

    #[test]
    fn descending_deletion_leaves_exact_complement() {
        let mut structure = structure_with_chain(&["ALA", "TRP", "GLY", "SER", "LYS"]);
        let doomed = [ResidueIndex::new(0, 0, 1), ResidueIndex::new(0, 0, 3)];

        let removed = structure.remove_residues(&doomed);

        assert_eq!(removed.len(), 2);
        assert_eq!(names(&structure), vec!["ALA", "GLY", "LYS"]);
    }

    #[test]
    fn ascending_deletion_corrupts_indices() {
        let mut structure = structure_with_chain(&["ALA", "TRP", "GLY", "SER", "LYS"]);
        for index in [ResidueIndex::new(0, 0, 1), ResidueIndex::new(0, 0, 3)] {
            structure.remove_residue(index);
        }
        // The second deletion hit LYS instead of SER.
        assert_eq!(names(&structure), vec!["ALA", "GLY", "SER"]);
        assert_ne!(names(&structure), vec!["ALA", "GLY", "LYS"]);
    }

    #[test]
    fn deletion_across_chains_and_models_keeps_other_residues() {
        let mut structure = structure_with_chain(&["ALA", "TRP", "GLY"]);
        let mut second = Chain::new("B");
        second.push_residue(Residue::new("MAN", 1).hetero());
        second.push_residue(Residue::new("MAN", 2).hetero());
        structure.models_mut()[0].push_chain(second);
        structure
            .model_or_insert(1)
            .push_chain(Chain::new("A"));
        structure.models_mut()[1].chains_mut()[0].push_residue(Residue::new("TRP", 7));

        let removed = structure.remove_residues(&[
            ResidueIndex::new(0, 1, 0),
            ResidueIndex::new(0, 0, 2),
            ResidueIndex::new(1, 0, 0),
            ResidueIndex::new(0, 1, 1),
            ResidueIndex::new(0, 1, 1),
        ]);

        assert_eq!(removed.len(), 4);
        assert_eq!(names(&structure), vec!["ALA", "TRP"]);
        structure.prune_empty_chains();
        assert_eq!(structure.models()[0].chains().len(), 1);
        assert!(structure.models()[1].chains().is_empty());
    }

    #[test]
    fn next_free_chain_id_skips_used_ids() {
        let structure = structure_with_chain(&["ALA"]);
        assert_eq!(structure.next_free_chain_id(0).as_deref(), Some("B"));
    }

    #[test]
    fn reference_sequence_maps_unknown_residues_to_x() {
        let mut structure = Structure::new("seq");
        structure.set_reference_sequence(
            "A",
            vec!["TRP".into(), "UNK".into(), "ALA".into()],
        );
        assert_eq!(structure.reference_sequence("A").as_deref(), Some("WXA"));
        assert!(structure.reference_sequence("B").is_none());
    }
}
