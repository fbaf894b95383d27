use crate::core::utils::identifiers::element_from_atom_name;
use nalgebra::Point3;

/// A single atom with the crystallographic properties carried by coordinate files.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number as read from the source file. Reassigned on write.
    pub serial: usize,
    /// The name of the atom (e.g., "CA", "CD1", "C1").
    pub name: String,
    /// Element symbol, upper case (e.g., "C", "SE").
    pub element: String,
    /// Orthogonal coordinates in Angstroms.
    pub position: Point3<f64>,
    pub occupancy: f64,
    /// Isotropic atomic displacement parameter in square Angstroms.
    pub b_factor: f64,
}

impl Atom {
    /// Creates a fully occupied atom, inferring the element from its name.
    ///
    /// # Arguments
    ///
    /// * `name` - The atom name.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, position: Point3<f64>) -> Self {
        Self {
            serial: 0,
            name: name.trim().to_string(),
            element: element_from_atom_name(name),
            position,
            occupancy: 1.0,
            b_factor: 20.0,
        }
    }

    pub fn with_element(mut self, element: &str) -> Self {
        self.element = element.trim().to_ascii_uppercase();
        self
    }

    pub fn with_b_factor(mut self, b_factor: f64) -> Self {
        self.b_factor = b_factor;
        self
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self.element.as_str(), "H" | "D")
    }
}
