use super::DensityError;
use super::cell::UnitCell;
use super::grid::{DensityGrid, GridBoundary};
use ndarray::Array3;
use std::fs;
use std::io::Write;
use std::path::Path;

const HEADER_SIZE: usize = 1024;
const MAP_MAGIC: &[u8; 4] = b"MAP ";

/// CCP4/MRC map files (1024-byte header followed by sections of grid values).
///
/// Modes 0 (i8), 1 (i16), 2 (f32) and 6 (u16) are read; endianness comes from the
/// MACHST stamp. Columns, rows and sections are mapped onto cell axes with
/// MAPC/MAPR/MAPS so the resulting grid is always stored in `[u, v, w]` order.
pub struct Ccp4File;

struct Header<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl Header<'_> {
    fn word(&self, index: usize) -> [u8; 4] {
        let offset = index * 4;
        [
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ]
    }

    fn int(&self, index: usize) -> i32 {
        let b = self.word(index);
        if self.little_endian {
            i32::from_le_bytes(b)
        } else {
            i32::from_be_bytes(b)
        }
    }

    fn float(&self, index: usize) -> f32 {
        let b = self.word(index);
        if self.little_endian {
            f32::from_le_bytes(b)
        } else {
            f32::from_be_bytes(b)
        }
    }
}

impl Ccp4File {
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<DensityGrid, DensityError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parses a map held in memory.
    ///
    /// # Return
    ///
    /// A periodic grid when the stored box spans the whole cell sampling, otherwise a
    /// bounded grid positioned at the header's start indices.
    pub fn from_bytes(bytes: &[u8]) -> Result<DensityGrid, DensityError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DensityError::InvalidFormat(format!(
                "file too small for a map header: {} bytes",
                bytes.len()
            )));
        }
        let raw = &bytes[..HEADER_SIZE];
        if &raw[208..212] != MAP_MAGIC {
            return Err(DensityError::InvalidFormat(
                "missing 'MAP ' stamp at word 53".to_string(),
            ));
        }
        let header = Header {
            bytes: raw,
            little_endian: detect_endianness(raw)?,
        };

        let dims = [header.int(0), header.int(1), header.int(2)];
        if dims.iter().any(|&d| d <= 0) {
            return Err(DensityError::InvalidFormat(format!(
                "non-positive grid dimensions {dims:?}"
            )));
        }
        let mode = header.int(3);
        let file_start = [header.int(4), header.int(5), header.int(6)];
        let sampling = [header.int(7), header.int(8), header.int(9)];
        if sampling.iter().any(|&m| m <= 0) {
            return Err(DensityError::InvalidFormat(format!(
                "non-positive cell sampling {sampling:?}"
            )));
        }
        let cell = UnitCell::new(
            header.float(10) as f64,
            header.float(11) as f64,
            header.float(12) as f64,
            header.float(13) as f64,
            header.float(14) as f64,
            header.float(15) as f64,
        )?;
        let axes = [header.int(16), header.int(17), header.int(18)];
        let mut seen = [false; 3];
        for &axis in &axes {
            if !(1..=3).contains(&axis) || seen[(axis - 1) as usize] {
                return Err(DensityError::InvalidFormat(format!(
                    "invalid axis order MAPC/MAPR/MAPS = {axes:?}"
                )));
            }
            seen[(axis - 1) as usize] = true;
        }
        let extended = header.int(23);
        if extended < 0 {
            return Err(DensityError::InvalidFormat(format!(
                "negative extended header size {extended}"
            )));
        }

        let count = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
            .ok_or_else(|| {
                DensityError::InvalidFormat(format!("grid dimensions {dims:?} overflow"))
            })?;
        let offset = HEADER_SIZE + extended as usize;
        let values = read_values(
            bytes.get(offset..).unwrap_or(&[]),
            mode,
            count,
            header.little_endian,
        )?;

        let mut shape = [0usize; 3];
        let mut start = [0isize; 3];
        for (file_axis, &cell_axis) in axes.iter().enumerate() {
            let a = (cell_axis - 1) as usize;
            shape[a] = dims[file_axis] as usize;
            start[a] = file_start[file_axis] as isize;
        }

        let [nc, nr, ns] = dims.map(|d| d as usize);
        let mut data = Array3::<f32>::zeros((shape[0], shape[1], shape[2]));
        for s in 0..ns {
            for r in 0..nr {
                let row = (s * nr + r) * nc;
                for c in 0..nc {
                    let mut uvw = [0usize; 3];
                    uvw[(axes[0] - 1) as usize] = c;
                    uvw[(axes[1] - 1) as usize] = r;
                    uvw[(axes[2] - 1) as usize] = s;
                    data[uvw] = values[row + c];
                }
            }
        }

        let sampling = [
            sampling[0] as usize,
            sampling[1] as usize,
            sampling[2] as usize,
        ];
        let boundary = if shape
            .iter()
            .zip(sampling.iter())
            .all(|(&n, &m)| n >= m)
        {
            GridBoundary::Periodic
        } else {
            GridBoundary::Bounded
        };
        DensityGrid::new(cell, sampling, start, data, boundary)
    }

    /// Writes a grid as a little-endian mode 2 map with X/Y/Z axis order.
    pub fn write_to(grid: &DensityGrid, writer: &mut impl Write) -> Result<(), DensityError> {
        let (nx, ny, nz) = grid.data().dim();
        let cell = grid.cell();
        let sampling = grid.sampling();
        let start = grid.start();
        let mut header = vec![0u8; HEADER_SIZE];
        let ints = [
            (0, nx as i32),
            (1, ny as i32),
            (2, nz as i32),
            (3, 2),
            (4, start[0] as i32),
            (5, start[1] as i32),
            (6, start[2] as i32),
            (7, sampling[0] as i32),
            (8, sampling[1] as i32),
            (9, sampling[2] as i32),
            (16, 1),
            (17, 2),
            (18, 3),
            (22, 1),
        ];
        for (index, value) in ints {
            header[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        let floats = [
            (10, cell.a),
            (11, cell.b),
            (12, cell.c),
            (13, cell.alpha),
            (14, cell.beta),
            (15, cell.gamma),
            (21, grid.mean()),
            (54, grid.rms()),
        ];
        for (index, value) in floats {
            header[index * 4..index * 4 + 4].copy_from_slice(&(value as f32).to_le_bytes());
        }
        let (min, max) = grid
            .data()
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        header[76..80].copy_from_slice(&min.to_le_bytes());
        header[80..84].copy_from_slice(&max.to_le_bytes());
        header[208..212].copy_from_slice(MAP_MAGIC);
        header[212..216].copy_from_slice(&[0x44, 0x41, 0x00, 0x00]);
        writer.write_all(&header)?;

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    writer.write_all(&grid.data()[[i, j, k]].to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    pub fn write_to_path<P: AsRef<Path>>(grid: &DensityGrid, path: P) -> Result<(), DensityError> {
        let mut writer = std::io::BufWriter::new(fs::File::create(path)?);
        Self::write_to(grid, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn detect_endianness(header: &[u8]) -> Result<bool, DensityError> {
    match header[212] {
        0x44 => Ok(true),
        0x11 => Ok(false),
        stamp => {
            let mode_bytes = [header[12], header[13], header[14], header[15]];
            if matches!(i32::from_le_bytes(mode_bytes), 0 | 1 | 2 | 6) {
                Ok(true)
            } else if matches!(i32::from_be_bytes(mode_bytes), 0 | 1 | 2 | 6) {
                Ok(false)
            } else {
                Err(DensityError::InvalidFormat(format!(
                    "cannot determine byte order (MACHST={stamp:#x})"
                )))
            }
        }
    }
}

fn read_values(
    data: &[u8],
    mode: i32,
    count: usize,
    little_endian: bool,
) -> Result<Vec<f32>, DensityError> {
    let width = match mode {
        0 => 1,
        1 | 6 => 2,
        2 => 4,
        other => return Err(DensityError::UnsupportedMode(other)),
    };
    let needed = count.checked_mul(width).ok_or_else(|| {
        DensityError::InvalidFormat(format!("{count} values of mode {mode} overflow"))
    })?;
    if data.len() < needed {
        return Err(DensityError::InvalidFormat(format!(
            "expected {needed} bytes of mode {mode} data, found {}",
            data.len()
        )));
    }
    let values = data[..needed]
        .chunks_exact(width)
        .map(|b| match (mode, little_endian) {
            (0, _) => b[0] as i8 as f32,
            (1, true) => i16::from_le_bytes([b[0], b[1]]) as f32,
            (1, false) => i16::from_be_bytes([b[0], b[1]]) as f32,
            (6, true) => u16::from_le_bytes([b[0], b[1]]) as f32,
            (6, false) => u16::from_be_bytes([b[0], b[1]]) as f32,
            (_, true) => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            (_, false) => f32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn sample_grid() -> DensityGrid {
        let cell = UnitCell::new(30.0, 40.0, 50.0, 90.0, 100.0, 90.0).unwrap();
        let data = Array3::from_shape_fn((6, 8, 10), |(i, j, k)| (i * 100 + j * 10 + k) as f32);
        DensityGrid::periodic(cell, data).unwrap()
    }

    #[test]
    fn written_map_reads_back_identically() {
        let grid = sample_grid();
        let mut bytes = Vec::new();
        Ccp4File::write_to(&grid, &mut bytes).unwrap();

        let read = Ccp4File::from_bytes(&bytes).unwrap();
        assert_eq!(read.sampling(), [6, 8, 10]);
        assert_eq!(read.boundary(), GridBoundary::Periodic);
        assert_eq!(read.data(), grid.data());
        assert!((read.cell().beta - 100.0).abs() < 1e-4);
    }

    #[test]
    fn swapped_axis_order_is_remapped() {
        let grid = sample_grid();
        let mut bytes = Vec::new();
        Ccp4File::write_to(&grid, &mut bytes).unwrap();

        // Rewrite the file with Z as the fastest axis: columns=Z, rows=Y, sections=X.
        let (nx, ny, nz) = grid.data().dim();
        bytes[0..4].copy_from_slice(&(nz as i32).to_le_bytes());
        bytes[8..12].copy_from_slice(&(nx as i32).to_le_bytes());
        bytes[64..68].copy_from_slice(&3i32.to_le_bytes());
        bytes[72..76].copy_from_slice(&1i32.to_le_bytes());
        let mut body = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    body.extend_from_slice(&grid.data()[[i, j, k]].to_le_bytes());
                }
            }
        }
        bytes.truncate(HEADER_SIZE);
        bytes.extend(body);

        let read = Ccp4File::from_bytes(&bytes).unwrap();
        assert_eq!(read.data(), grid.data());
    }

    #[test]
    fn partial_box_becomes_bounded_grid() {
        let cell = UnitCell::orthogonal(20.0, 20.0, 20.0).unwrap();
        let grid = DensityGrid::new(
            cell,
            [20, 20, 20],
            [5, 5, 5],
            Array3::from_elem((4, 4, 4), 1.5),
            GridBoundary::Bounded,
        )
        .unwrap();
        let mut bytes = Vec::new();
        Ccp4File::write_to(&grid, &mut bytes).unwrap();

        let read = Ccp4File::from_bytes(&bytes).unwrap();
        assert_eq!(read.boundary(), GridBoundary::Bounded);
        assert_eq!(read.start(), [5, 5, 5]);
        assert_eq!(read.value_nearest(&Point3::new(6.0, 6.0, 6.0)), Some(1.5));
        assert_eq!(read.value_nearest(&Point3::new(1.0, 1.0, 1.0)), None);
    }

    #[test]
    fn truncated_or_unstamped_files_are_rejected() {
        assert!(matches!(
            Ccp4File::from_bytes(&[0u8; 100]),
            Err(DensityError::InvalidFormat(_))
        ));
        let mut bytes = Vec::new();
        Ccp4File::write_to(&sample_grid(), &mut bytes).unwrap();
        bytes[208..212].copy_from_slice(b"NOPE");
        assert!(Ccp4File::from_bytes(&bytes).is_err());
    }

    #[test]
    fn oversized_dimensions_are_rejected_without_overflow() {
        let mut bytes = Vec::new();
        Ccp4File::write_to(&sample_grid(), &mut bytes).unwrap();
        for word in 0..3 {
            bytes[word * 4..word * 4 + 4].copy_from_slice(&i32::MAX.to_le_bytes());
        }
        match Ccp4File::from_bytes(&bytes) {
            Err(DensityError::InvalidFormat(message)) => assert!(message.contains("overflow")),
            other => panic!("unexpected result: {other:?}"),
        }

        // The element count fits but its byte length does not.
        bytes[8..12].copy_from_slice(&3i32.to_le_bytes());
        assert!(matches!(
            Ccp4File::from_bytes(&bytes),
            Err(DensityError::InvalidFormat(_))
        ));
    }

    #[test]
    fn unsupported_mode_is_reported() {
        let mut bytes = Vec::new();
        Ccp4File::write_to(&sample_grid(), &mut bytes).unwrap();
        bytes[12..16].copy_from_slice(&4i32.to_le_bytes());
        assert!(matches!(
            Ccp4File::from_bytes(&bytes),
            Err(DensityError::UnsupportedMode(4))
        ));
    }
}
