//! Helpers shared by the engine's external-program collaborators.

pub mod process;
