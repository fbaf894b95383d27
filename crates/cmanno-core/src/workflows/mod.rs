//! # Workflows Module
//!
//! High-level entry points that tie the engine components into complete procedures.
//!
//! ## Architecture
//!
//! - **Detection** ([`detect`]) - Anchors, sequence-context filter, blob classification,
//!   motif matching and reconciliation into graft targets.
//! - **Grafting** ([`graft`]) - Runs the graft cycle for a target list and converts between
//!   targets and stored graft plans.
//! - **Re-grafting** ([`regraft`]) - Strips modelled C-mannoses and grafts them afresh.
//! - **Pipeline** ([`pipeline`]) - One structure end to end, from its job record to a
//!   validated model, a summary table and a [`pipeline::UnitReport`].
//! - **Batch** ([`batch`]) - Many structures, each in its own time- and memory-limited
//!   child process, reduced into a keyed result map and a failure journal.

pub mod batch;
pub mod detect;
pub mod graft;
pub mod pipeline;
pub mod regraft;
