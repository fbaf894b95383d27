//! Shared helpers: residue and element tables, and coordinate geometry.

pub mod geometry;
pub mod identifiers;
