use super::state::{AnchorPoint, Provenance};
use crate::core::models::ids::{ResidueIndex, ResidueKey};
use crate::core::models::residue::Residue;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::project_along;
use nalgebra::Point3;

/// Derives the expected sugar centroid of a candidate residue from two side-chain atoms.
///
/// The anchor lies on the ray from the reference atom through the direction atom, at a
/// fixed distance from the reference atom.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorGeometry {
    pub residue_name: String,
    pub reference_atom: String,
    pub direction_atom: String,
    /// Average reference-atom to sugar-centroid distance in Angstroms.
    pub length: f64,
}

impl Default for AnchorGeometry {
    fn default() -> Self {
        Self {
            residue_name: "TRP".to_string(),
            reference_atom: "CE3".to_string(),
            direction_atom: "CD1".to_string(),
            length: 6.4118,
        }
    }
}

impl AnchorGeometry {
    pub fn applies_to(&self, residue: &Residue) -> bool {
        residue.name == self.residue_name
    }

    /// Computes the anchor of one residue.
    ///
    /// # Return
    ///
    /// Returns `None` when the residue is of another type, lacks either atom, or the
    /// two atoms coincide.
    pub fn anchor_for(&self, residue: &Residue) -> Option<Point3<f64>> {
        if !self.applies_to(residue) {
            return None;
        }
        let reference = residue.position_of(&self.reference_atom)?;
        let direction = residue.position_of(&self.direction_atom)?;
        project_along(&reference, &direction, self.length)
    }

    /// Anchors of every applicable residue in the first model, in chain order.
    pub fn anchors(&self, structure: &Structure) -> Vec<AnchorPoint> {
        structure
            .residues_iter()
            .filter(|(index, _, _)| index.model == 0)
            .filter_map(|(index, chain, residue)| {
                self.anchor_for(residue).map(|position| AnchorPoint {
                    key: ResidueKey::new(chain.id.clone(), residue.seq_num),
                    index,
                    position,
                    provenance: Provenance::Geometric,
                })
            })
            .collect()
    }

    /// Anchor of a single addressed residue, if it qualifies.
    pub fn anchor_at(&self, structure: &Structure, index: ResidueIndex) -> Option<AnchorPoint> {
        let chain = structure.chain(index.model, index.chain)?;
        let residue = structure.residue(index)?;
        self.anchor_for(residue).map(|position| AnchorPoint {
            key: ResidueKey::new(chain.id.clone(), residue.seq_num),
            index,
            position,
            provenance: Provenance::Geometric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::chain::Chain;

    fn trp(seq_num: isize, ce3: Option<[f64; 3]>, cd1: Option<[f64; 3]>) -> Residue {
        let mut residue = Residue::new("TRP", seq_num);
        residue.add_atom(Atom::new("CA", Point3::new(0.0, 0.0, 0.0)));
        if let Some([x, y, z]) = ce3 {
            residue.add_atom(Atom::new("CE3", Point3::new(x, y, z)));
        }
        if let Some([x, y, z]) = cd1 {
            residue.add_atom(Atom::new("CD1", Point3::new(x, y, z)));
        }
        residue
    }

    #[test]
    fn anchor_lies_at_fixed_distance_along_the_ring_axis() {
        let geometry = AnchorGeometry::default();
        let residue = trp(1, Some([1.0, 2.0, 3.0]), Some([2.0, 2.0, 3.0]));
        let anchor = geometry.anchor_for(&residue).unwrap();
        let reference = Point3::new(1.0, 2.0, 3.0);
        assert!(((anchor - reference).norm() - 6.4118).abs() < 1e-12);
        assert!((anchor - Point3::new(7.4118, 2.0, 3.0)).norm() < 1e-12);
        assert_eq!(geometry.anchor_for(&residue), Some(anchor));
    }

    #[test]
    fn missing_atoms_or_wrong_residue_give_no_anchor() {
        let geometry = AnchorGeometry::default();
        assert!(geometry.anchor_for(&trp(1, None, Some([1.0, 0.0, 0.0]))).is_none());
        assert!(geometry.anchor_for(&trp(1, Some([1.0, 0.0, 0.0]), None)).is_none());

        let mut tyr = Residue::new("TYR", 2);
        tyr.add_atom(Atom::new("CE3", Point3::new(0.0, 0.0, 0.0)));
        tyr.add_atom(Atom::new("CD1", Point3::new(1.0, 0.0, 0.0)));
        assert!(geometry.anchor_for(&tyr).is_none());
    }

    #[test]
    fn anchors_cover_only_qualifying_residues_of_the_first_model() {
        let mut structure = Structure::new("anchors");
        let mut chain = Chain::new("A");
        chain.push_residue(trp(10, Some([0.0, 0.0, 0.0]), Some([0.0, 1.0, 0.0])));
        chain.push_residue(trp(11, None, None));
        chain.push_residue(Residue::new("ALA", 12));
        structure.model_or_insert(0).push_chain(chain.clone());
        structure.model_or_insert(1).push_chain(chain);

        let anchors = AnchorGeometry::default().anchors(&structure);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].key, ResidueKey::new("A", 10));
        assert_eq!(anchors[0].index, ResidueIndex::new(0, 0, 0));
        assert_eq!(anchors[0].provenance, Provenance::Geometric);
    }
}
