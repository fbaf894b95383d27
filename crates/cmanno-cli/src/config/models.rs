use cmanno::engine::config as core_config;
use cmanno::engine::state::DonorRef;

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub detection: core_config::DetectionConfig,
    pub graft: core_config::GraftConfig,
    pub refmac: core_config::RefmacConfig,
    pub map: core_config::MapConfig,
    pub batch: core_config::BatchConfig,
    /// Donor for detected targets, when one was configured.
    pub donor: Option<DonorRef>,
}
