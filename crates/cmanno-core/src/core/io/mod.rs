//! Reading and writing the files the pipeline exchanges with the outside world.
//!
//! - [`pdb`] reads and writes coordinate files through the [`traits::MolecularFile`]
//!   interface.
//! - [`store`] holds the keyed job store and the append-only failure journal.
//! - [`report`] writes CSV summary tables.

pub mod pdb;
pub mod report;
pub mod store;
pub mod traits;
