use serde::{Deserialize, Serialize};
use std::fmt;

/// Positional address of a residue inside a [`Structure`](super::structure::Structure).
///
/// Indices are only valid until the structure is mutated. Field order matters for
/// the derived ordering: residues are compared by model, then chain, then residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueIndex {
    pub model: usize,
    pub chain: usize,
    pub residue: usize,
}

impl ResidueIndex {
    pub fn new(model: usize, chain: usize, residue: usize) -> Self {
        Self {
            model,
            chain,
            residue,
        }
    }

    /// Key used when deleting several residues at once.
    ///
    /// Sorting these keys in descending order guarantees that every deletion only
    /// shifts residues that have already been removed.
    pub fn deletion_key(&self) -> (usize, usize, usize) {
        (self.residue, self.chain, self.model)
    }
}

/// Stable identity of a residue: chain name plus author sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueKey {
    pub chain_id: String,
    pub seq_num: isize,
}

impl ResidueKey {
    pub fn new(chain_id: impl Into<String>, seq_num: isize) -> Self {
        Self {
            chain_id: chain_id.into(),
            seq_num,
        }
    }
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain_id, self.seq_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_keys_sort_residue_first() {
        let mut indices = vec![
            ResidueIndex::new(0, 1, 2),
            ResidueIndex::new(0, 0, 5),
            ResidueIndex::new(1, 0, 2),
        ];
        indices.sort_by_key(|i| std::cmp::Reverse(i.deletion_key()));
        assert_eq!(indices[0], ResidueIndex::new(0, 0, 5));
        assert_eq!(indices[1], ResidueIndex::new(1, 0, 2));
        assert_eq!(indices[2], ResidueIndex::new(0, 1, 2));
    }

    #[test]
    fn residue_key_displays_chain_and_number() {
        assert_eq!(ResidueKey::new("A", 100).to_string(), "A/100");
        assert_eq!(ResidueKey::new("B", -3).to_string(), "B/-3");
    }
}
