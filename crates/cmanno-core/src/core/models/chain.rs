use super::residue::Residue;

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub id: String,                      // Chain identifier (e.g., "A", "B")
    pub(crate) residues: Vec<Residue>,   // Residues in file order
}

impl Chain {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.trim().to_string(),
            residues: Vec::new(),
        }
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn residues_mut(&mut self) -> &mut [Residue] {
        &mut self.residues
    }

    /// Appends a residue and returns its position within the chain.
    pub fn push_residue(&mut self, residue: Residue) -> usize {
        self.residues.push(residue);
        self.residues.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Positions of amino-acid residues, in chain order.
    pub fn polymer_indices(&self) -> Vec<usize> {
        self.residues
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_amino_acid())
            .map(|(i, _)| i)
            .collect()
    }

    /// One-letter sequence of the modelled amino-acid residues.
    pub fn polymer_sequence(&self) -> String {
        self.residues.iter().filter_map(Residue::one_letter).collect()
    }

    pub fn position_of(&self, seq_num: isize) -> Option<usize> {
        self.residues.iter().position(|r| r.seq_num == seq_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Chain {
        let mut chain = Chain::new("A");
        chain.push_residue(Residue::new("TRP", 1));
        chain.push_residue(Residue::new("HOH", 2).hetero());
        chain.push_residue(Residue::new("ALA", 3));
        chain
    }

    #[test]
    fn polymer_sequence_skips_non_amino_acids() {
        assert_eq!(chain().polymer_sequence(), "WA");
        assert_eq!(chain().polymer_indices(), vec![0, 2]);
    }

    #[test]
    fn position_of_finds_sequence_number() {
        assert_eq!(chain().position_of(3), Some(2));
        assert_eq!(chain().position_of(4), None);
    }
}
