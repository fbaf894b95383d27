//! # cmanno Core Library
//!
//! Finds C-mannosylation sites in crystal structures and validates grafted glycans against
//! the experimental density.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the three-layer split of a data layer, a logic layer and a thin
//! workflow layer on top.
//!
//! - **[`core`]: The Foundation.** Stateless structural models, density grids, and readers and
//!   writers for PDB, CCP4 maps, the JSON job store and CSV reports.
//!
//! - **[`engine`]: The Logic Core.** Anchor geometry, blob scoring, sequence motif matching
//!   and target reconciliation for detection, plus the graft cycle that attaches glycans,
//!   refines, scores by real-space correlation and prunes the misfits.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built from the engine: detection,
//!   grafting, re-grafting of existing C-mannoses, the single-structure pipeline and the
//!   isolated-process batch runner.

pub mod core;
pub mod engine;
pub mod workflows;
