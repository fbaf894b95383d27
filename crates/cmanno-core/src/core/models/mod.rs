//! # Core Models Module
//!
//! This module contains the data structures used to represent crystal structures
//! in cmanno, providing the foundation for every pipeline stage.
//!
//! ## Overview
//!
//! A [`structure::Structure`] is an ordered collection of models, each an ordered
//! collection of chains, each an ordered sequence of residues holding named atoms.
//! Residues are addressed positionally with [`ids::ResidueIndex`] and by identity with
//! [`ids::ResidueKey`] (chain name plus author sequence number).
//!
//! ## Key Components
//!
//! - [`atom`] - Atom name, element, position, occupancy and B-factor
//! - [`residue`] - Residue name, numbering and atoms
//! - [`chain`] - Chains and their polymer sequence
//! - [`structure`] - Models, experimental metadata and residue deletion
//! - [`ids`] - Positional and identity keys for residues
//!
//! ## Usage
//!
//! ```ignore
//! use cmanno::core::models::{structure::Structure, chain::Chain, residue::Residue};
//!
//! let mut structure = Structure::new("1abc");
//! let mut chain = Chain::new("A");
//! chain.push_residue(Residue::new("TRP", 100));
//! structure.model_or_insert(0).push_chain(chain);
//! ```

pub mod atom;
pub mod chain;
pub mod ids;
pub mod residue;
pub mod structure;
