use super::atom::Atom;
use crate::core::utils::identifiers::{is_water, one_letter_code};
use nalgebra::Point3;

#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub name: String,            // Residue name (e.g., "TRP", "MAN")
    pub seq_num: isize,          // Author sequence number
    pub ins_code: Option<char>,  // Insertion code, if any
    pub het: bool,               // Read from HETATM records
    pub(crate) atoms: Vec<Atom>, // Atoms in file order
}

impl Residue {
    pub fn new(name: &str, seq_num: isize) -> Self {
        Self {
            name: name.trim().to_string(),
            seq_num,
            ins_code: None,
            het: false,
            atoms: Vec::new(),
        }
    }

    pub fn hetero(mut self) -> Self {
        self.het = true;
        self
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn add_atom(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }

    pub fn atom(&self, name: &str) -> Option<&Atom> {
        self.atoms.iter().find(|a| a.name == name)
    }

    pub fn position_of(&self, name: &str) -> Option<Point3<f64>> {
        self.atom(name).map(|a| a.position)
    }

    /// One-letter amino-acid code, `None` for anything that is not an amino acid.
    pub fn one_letter(&self) -> Option<char> {
        one_letter_code(&self.name)
    }

    pub fn is_amino_acid(&self) -> bool {
        self.one_letter().is_some()
    }

    pub fn is_water(&self) -> bool {
        is_water(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tryptophan() -> Residue {
        let mut residue = Residue::new("TRP", 100);
        residue.add_atom(Atom::new("CD1", Point3::new(1.0, 0.0, 0.0)));
        residue.add_atom(Atom::new("CE3", Point3::new(0.0, 0.0, 0.0)));
        residue
    }

    #[test]
    fn atom_lookup_by_name() {
        let residue = tryptophan();
        assert_eq!(residue.position_of("CD1"), Some(Point3::new(1.0, 0.0, 0.0)));
        assert!(residue.atom("CZ2").is_none());
    }

    #[test]
    fn classification_uses_residue_name() {
        assert_eq!(tryptophan().one_letter(), Some('W'));
        assert!(!Residue::new("MAN", 1).hetero().is_amino_acid());
        assert!(Residue::new("HOH", 5).is_water());
    }
}
