//! Computational kernels shared by the engine components.

pub mod clash_detection;
