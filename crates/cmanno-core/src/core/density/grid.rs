use super::DensityError;
use super::cell::UnitCell;
use nalgebra::{Point3, Vector3};
use ndarray::Array3;

/// How indices outside the stored box are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridBoundary {
    /// Crystallographic map: indices wrap modulo the cell sampling.
    Periodic,
    /// A box in space: indices outside the stored data have no value.
    Bounded,
}

/// A grid point that fell inside a query region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSample {
    pub index: [isize; 3],
    pub position: Point3<f64>,
    pub value: f32,
}

/// A scalar density field sampled on a regular grid over a unit cell.
///
/// `sampling` is the number of grid intervals along each full cell edge; `start` is
/// the grid index of the first stored point along each axis and `data` holds the
/// stored box in `[u, v, w]` order.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    cell: UnitCell,
    sampling: [usize; 3],
    start: [isize; 3],
    data: Array3<f32>,
    boundary: GridBoundary,
}

impl DensityGrid {
    /// Creates a grid from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::Shape`] if any sampling count is zero or the data
    /// array is empty.
    pub fn new(
        cell: UnitCell,
        sampling: [usize; 3],
        start: [isize; 3],
        data: Array3<f32>,
        boundary: GridBoundary,
    ) -> Result<Self, DensityError> {
        if sampling.contains(&0) {
            return Err(DensityError::Shape(format!(
                "cell sampling must be positive, got {sampling:?}"
            )));
        }
        if data.is_empty() {
            return Err(DensityError::Shape("grid holds no data".to_string()));
        }
        Ok(Self {
            cell,
            sampling,
            start,
            data,
            boundary,
        })
    }

    /// Creates a periodic grid whose data covers exactly one unit cell.
    pub fn periodic(cell: UnitCell, data: Array3<f32>) -> Result<Self, DensityError> {
        let (nu, nv, nw) = data.dim();
        Self::new(cell, [nu, nv, nw], [0, 0, 0], data, GridBoundary::Periodic)
    }

    pub fn cell(&self) -> &UnitCell {
        &self.cell
    }

    pub fn sampling(&self) -> [usize; 3] {
        self.sampling
    }

    pub fn start(&self) -> [isize; 3] {
        self.start
    }

    pub fn boundary(&self) -> GridBoundary {
        self.boundary
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    fn storage_index(&self, index: [isize; 3]) -> Option<[usize; 3]> {
        let (nx, ny, nz) = self.data.dim();
        let shape = [nx, ny, nz];
        let mut local = [0usize; 3];
        for axis in 0..3 {
            let offset = index[axis] - self.start[axis];
            let offset = match self.boundary {
                GridBoundary::Periodic => offset.rem_euclid(self.sampling[axis] as isize),
                GridBoundary::Bounded => offset,
            };
            if offset < 0 || offset as usize >= shape[axis] {
                return None;
            }
            local[axis] = offset as usize;
        }
        Some(local)
    }

    /// Density at a grid index, or `None` if that point is not stored.
    pub fn value_at_index(&self, index: [isize; 3]) -> Option<f32> {
        self.storage_index(index)
            .map(|[i, j, k]| self.data[[i, j, k]])
    }

    /// Orthogonal position of a grid index.
    pub fn grid_point_position(&self, index: [isize; 3]) -> Point3<f64> {
        let fractional = Vector3::new(
            index[0] as f64 / self.sampling[0] as f64,
            index[1] as f64 / self.sampling[1] as f64,
            index[2] as f64 / self.sampling[2] as f64,
        );
        self.cell.orthogonalize(&fractional)
    }

    /// Continuous grid coordinates of an orthogonal position.
    pub fn grid_coordinates(&self, position: &Point3<f64>) -> Vector3<f64> {
        let f = self.cell.fractionalize(position);
        Vector3::new(
            f.x * self.sampling[0] as f64,
            f.y * self.sampling[1] as f64,
            f.z * self.sampling[2] as f64,
        )
    }

    /// Density at the grid point closest to `position`.
    pub fn value_nearest(&self, position: &Point3<f64>) -> Option<f32> {
        let g = self.grid_coordinates(position);
        self.value_at_index([
            g.x.round() as isize,
            g.y.round() as isize,
            g.z.round() as isize,
        ])
    }

    /// Trilinear interpolation at `position`.
    ///
    /// # Return
    ///
    /// Returns `None` if any of the eight surrounding grid points is not stored.
    pub fn interpolate(&self, position: &Point3<f64>) -> Option<f64> {
        let g = self.grid_coordinates(position);
        let base = [g.x.floor(), g.y.floor(), g.z.floor()];
        let t = [g.x - base[0], g.y - base[1], g.z - base[2]];
        let base = [base[0] as isize, base[1] as isize, base[2] as isize];

        let mut value = 0.0;
        for corner in 0..8 {
            let di = (corner & 1) as isize;
            let dj = ((corner >> 1) & 1) as isize;
            let dk = ((corner >> 2) & 1) as isize;
            let weight = (if di == 1 { t[0] } else { 1.0 - t[0] })
                * (if dj == 1 { t[1] } else { 1.0 - t[1] })
                * (if dk == 1 { t[2] } else { 1.0 - t[2] });
            let v = self.value_at_index([base[0] + di, base[1] + dj, base[2] + dk])?;
            value += weight * v as f64;
        }
        Some(value)
    }

    /// Every stored grid point whose orthogonal distance to `center` is at most `radius`.
    ///
    /// Walks the integer grid indices inside the fractional bounding box of the sphere
    /// and keeps the points that pass the distance test. Points are returned in index
    /// order (u slowest, w fastest), which keeps downstream sums reproducible.
    pub fn points_within(&self, center: &Point3<f64>, radius: f64) -> Vec<GridSample> {
        if !(radius >= 0.0) {
            return Vec::new();
        }
        let g = self.grid_coordinates(center);
        if !(g.x.is_finite() && g.y.is_finite() && g.z.is_finite()) {
            return Vec::new();
        }
        let extent = self.cell.fractional_extent(radius);
        let reach = [
            extent.x * self.sampling[0] as f64,
            extent.y * self.sampling[1] as f64,
            extent.z * self.sampling[2] as f64,
        ];
        let lo = [
            (g.x - reach[0]).floor() as isize,
            (g.y - reach[1]).floor() as isize,
            (g.z - reach[2]).floor() as isize,
        ];
        let hi = [
            (g.x + reach[0]).ceil() as isize,
            (g.y + reach[1]).ceil() as isize,
            (g.z + reach[2]).ceil() as isize,
        ];

        if self.boundary == GridBoundary::Bounded && !self.box_overlaps(lo, hi) {
            return Vec::new();
        }

        let radius_sq = radius * radius;
        let mut samples = Vec::new();
        for u in lo[0]..=hi[0] {
            for v in lo[1]..=hi[1] {
                for w in lo[2]..=hi[2] {
                    let index = [u, v, w];
                    let position = self.grid_point_position(index);
                    if (position - center).norm_squared() > radius_sq {
                        continue;
                    }
                    if let Some(value) = self.value_at_index(index) {
                        samples.push(GridSample {
                            index,
                            position,
                            value,
                        });
                    }
                }
            }
        }
        samples
    }

    fn box_overlaps(&self, lo: [isize; 3], hi: [isize; 3]) -> bool {
        let (nx, ny, nz) = self.data.dim();
        let shape = [nx as isize, ny as isize, nz as isize];
        (0..3).all(|axis| {
            hi[axis] >= self.start[axis] && lo[axis] < self.start[axis] + shape[axis]
        })
    }

    pub fn mean(&self) -> f64 {
        let n = self.data.len() as f64;
        self.data.iter().map(|&v| v as f64).sum::<f64>() / n
    }

    /// Standard deviation of the stored values around their mean.
    pub fn rms(&self) -> f64 {
        let mean = self.mean();
        let n = self.data.len() as f64;
        (self
            .data
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n)
            .sqrt()
    }

    /// Rescales the stored values in place to zero mean and unit standard deviation.
    ///
    /// A constant grid is left untouched.
    pub fn normalize(&mut self) {
        let mean = self.mean();
        let rms = self.rms();
        if rms <= f64::EPSILON {
            return;
        }
        self.data
            .mapv_inplace(|v| ((v as f64 - mean) / rms) as f32);
    }
}
