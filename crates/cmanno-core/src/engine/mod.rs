//! # Engine Module
//!
//! The site-detection components and the graft-validation cycle.
//!
//! ## Architecture
//!
//! - **Detection** ([`anchor`], [`blob`], [`consensus`], [`reconcile`]) - Anchor geometry,
//!   density blob scoring, sequence motif matching and the join that turns both into
//!   graft targets.
//! - **Grafting** ([`graft`]) - The builder, refinement, map and RSCC collaborators and the
//!   attach/refine/score/prune cycle that drives them.
//! - **Configuration** ([`config`]) - Thresholds, calibrations and external program settings,
//!   assembled through builders.
//! - **State** ([`state`]) - Typed records passed between the stages.
//! - **Progress** ([`progress`]) and **Errors** ([`error`]).

pub mod anchor;
pub mod blob;
pub mod config;
pub mod consensus;
pub mod error;
pub mod graft;
pub mod progress;
pub mod reconcile;
pub mod state;
pub(crate) mod tasks;
pub(crate) mod utils;
