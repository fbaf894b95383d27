//! # Core Module
//!
//! Structural data, density grids and file formats that the engine builds on.
//!
//! - **Molecular Representation** ([`models`]) - Structures, models, chains, residues and atoms
//!   with stable residue keys and index-safe deletion.
//! - **Electron Density** ([`density`]) - Unit cells, sampled grids and CCP4 map I/O.
//! - **File I/O** ([`io`]) - PDB coordinates, the job store, the failure journal and CSV reports.
//! - **Utilities** ([`utils`]) - Geometry helpers and residue/element lookup tables.

pub mod density;
pub mod io;
pub mod models;
pub mod utils;
