use super::DensityError;
use nalgebra::{Matrix3, Point3, Vector3};

/// Crystallographic unit cell with precomputed coordinate transforms.
///
/// Orthogonal axes follow the PDB/CCP4 convention: `a` along x, `b` in the xy plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    orth: Matrix3<f64>,
    frac: Matrix3<f64>,
}

impl UnitCell {
    /// Builds a cell from edge lengths (Angstroms) and angles (degrees).
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::InvalidCell`] for non-positive edges or angles that do
    /// not describe a cell with positive volume.
    pub fn new(
        a: f64,
        b: f64,
        c: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    ) -> Result<Self, DensityError> {
        if a <= 0.0 || b <= 0.0 || c <= 0.0 {
            return Err(DensityError::InvalidCell(format!(
                "edge lengths must be positive (a={a}, b={b}, c={c})"
            )));
        }
        let (ca, cb, cg) = (
            alpha.to_radians().cos(),
            beta.to_radians().cos(),
            gamma.to_radians().cos(),
        );
        let sg = gamma.to_radians().sin();
        let volume_term = 1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg;
        if volume_term <= 0.0 || sg.abs() < 1e-9 {
            return Err(DensityError::InvalidCell(format!(
                "angles ({alpha}, {beta}, {gamma}) give a degenerate cell"
            )));
        }
        let v = volume_term.sqrt();
        let orth = Matrix3::new(
            a,
            b * cg,
            c * cb,
            0.0,
            b * sg,
            c * (ca - cb * cg) / sg,
            0.0,
            0.0,
            c * v / sg,
        );
        let frac = orth.try_inverse().ok_or_else(|| {
            DensityError::InvalidCell("orthogonalization matrix is singular".to_string())
        })?;
        Ok(Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            orth,
            frac,
        })
    }

    pub fn orthogonal(a: f64, b: f64, c: f64) -> Result<Self, DensityError> {
        Self::new(a, b, c, 90.0, 90.0, 90.0)
    }

    pub fn volume(&self) -> f64 {
        self.orth.determinant()
    }

    pub fn orthogonalize(&self, fractional: &Vector3<f64>) -> Point3<f64> {
        Point3::from(self.orth * fractional)
    }

    pub fn fractionalize(&self, position: &Point3<f64>) -> Vector3<f64> {
        self.frac * position.coords
    }

    /// Largest change of each fractional coordinate over a displacement of `distance`.
    pub fn fractional_extent(&self, distance: f64) -> Vector3<f64> {
        Vector3::new(
            self.frac.row(0).norm() * distance,
            self.frac.row(1).norm() * distance,
            self.frac.row(2).norm() * distance,
        )
    }
}
