use cmanno::engine::config::{self as core_config, ThresholdCalibration};

/// Fallback values for everything the file and the command line leave unset.
pub struct DefaultsConfig {
    pub calibration: ThresholdCalibration,
    pub sphere_radius: f64,
    pub motif: String,
    pub rscc_threshold: f64,
    pub refine_cycles: u32,
    pub glycan_index: usize,
    pub workers: usize,
    pub timeout_secs: u64,
    pub memory_mib: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            calibration: ThresholdCalibration::GRAFTING,
            sphere_radius: core_config::DEFAULT_SPHERE_RADIUS,
            motif: core_config::DEFAULT_MOTIF.to_string(),
            rscc_threshold: core_config::DEFAULT_RSCC_THRESHOLD,
            refine_cycles: core_config::DEFAULT_REFINE_CYCLES,
            glycan_index: 0,
            workers: core_config::DEFAULT_WORKERS,
            timeout_secs: core_config::DEFAULT_TIMEOUT.as_secs(),
            memory_mib: core_config::DEFAULT_MEMORY_LIMIT_BYTES / (1024 * 1024),
        }
    }
}
