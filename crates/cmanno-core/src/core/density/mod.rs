//! # Density Module
//!
//! Electron-density grids and the unit-cell geometry that maps them onto model space.
//!
//! ## Overview
//!
//! - [`cell`] - Unit cell parameters with orthogonalization/fractionalization matrices
//! - [`grid`] - A sampled scalar field over the cell with point lookup, interpolation,
//!   sphere rasterization and normalization
//! - [`ccp4`] - Reader and writer for CCP4/MRC map files
//!
//! Grids are either periodic (crystallographic maps covering the asymmetric unit or
//! the full cell, where indices wrap) or bounded (a box cut out of space, where points
//! outside the stored box simply do not exist).

use std::io;
use thiserror::Error;

pub mod ccp4;
pub mod cell;
pub mod grid;

#[derive(Debug, Error)]
pub enum DensityError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid map format: {0}")]
    InvalidFormat(String),
    #[error("Unsupported map mode {0} (expected 0, 1, 2 or 6)")]
    UnsupportedMode(i32),
    #[error("Invalid unit cell: {0}")]
    InvalidCell(String),
    #[error("Grid shape mismatch: {0}")]
    Shape(String),
}
