use super::anchor::AnchorGeometry;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SPHERE_RADIUS: f64 = 3.0;
pub const DEFAULT_SEQUON: &str = "W.{2}W";
pub const DEFAULT_HALF_WINDOW: usize = 6;
pub const DEFAULT_MOTIF: &str = "W";
pub const DEFAULT_RSCC_THRESHOLD: f64 = 0.5;
pub const DEFAULT_REFINE_CYCLES: u32 = 20;
pub const DEFAULT_RECALCULATION_CYCLES: u32 = 0;
pub const DEFAULT_CLASH_DISTANCE: f64 = 2.0;
pub const DEFAULT_MASK_RADIUS: f64 = 2.0;
pub const DEFAULT_WORKERS: usize = 128;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 10 * 1024 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {parameter}: {message}")]
    InvalidValue {
        parameter: &'static str,
        message: String,
    },
}

/// A linear resolution-to-threshold calibration: `slope * resolution + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdCalibration {
    pub name: &'static str,
    pub slope: f64,
    pub intercept: f64,
}

impl ThresholdCalibration {
    /// Calibration used when detecting targets for grafting.
    pub const GRAFTING: Self = Self {
        name: "grafting",
        slope: 0.41868,
        intercept: -0.17116,
    };

    /// Calibration used when surveying deposited crystal structures.
    pub const SURVEY: Self = Self {
        name: "survey",
        slope: 0.3877,
        intercept: -0.2417,
    };

    pub fn threshold(&self, resolution: f64) -> f64 {
        self.slope * resolution + self.intercept
    }

    /// Looks up a preset by name, ignoring case.
    pub fn by_name(name: &str) -> Option<Self> {
        [Self::GRAFTING, Self::SURVEY]
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// How the occupied/empty density threshold is chosen for a structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdPolicy {
    Explicit(f64),
    Calibrated(ThresholdCalibration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub threshold: ThresholdPolicy,
    pub sphere_radius: f64,
    pub anchor: AnchorGeometry,
    /// Pattern the inner window around a candidate must match; `None` disables it.
    pub sequon: Option<String>,
    pub half_window: usize,
    pub motif: String,
}

#[derive(Default)]
pub struct DetectionConfigBuilder {
    threshold: Option<ThresholdPolicy>,
    sphere_radius: Option<f64>,
    anchor: Option<AnchorGeometry>,
    sequon: Option<Option<String>>,
    half_window: Option<usize>,
    motif: Option<String>,
}

impl DetectionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threshold(mut self, policy: ThresholdPolicy) -> Self {
        self.threshold = Some(policy);
        self
    }
    pub fn sphere_radius(mut self, radius: f64) -> Self {
        self.sphere_radius = Some(radius);
        self
    }
    pub fn anchor(mut self, anchor: AnchorGeometry) -> Self {
        self.anchor = Some(anchor);
        self
    }
    pub fn sequon(mut self, pattern: Option<String>) -> Self {
        self.sequon = Some(pattern);
        self
    }
    pub fn half_window(mut self, half_window: usize) -> Self {
        self.half_window = Some(half_window);
        self
    }
    pub fn motif(mut self, motif: impl Into<String>) -> Self {
        self.motif = Some(motif.into());
        self
    }

    pub fn build(self) -> Result<DetectionConfig, ConfigError> {
        let sphere_radius = self
            .sphere_radius
            .ok_or(ConfigError::MissingParameter("sphere_radius"))?;
        if !(sphere_radius > 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "sphere_radius",
                message: format!("must be positive, got {sphere_radius}"),
            });
        }
        let half_window = self.half_window.unwrap_or(DEFAULT_HALF_WINDOW);
        if half_window < 3 {
            return Err(ConfigError::InvalidValue {
                parameter: "half_window",
                message: "must cover at least three residues on each side".into(),
            });
        }
        Ok(DetectionConfig {
            threshold: self
                .threshold
                .ok_or(ConfigError::MissingParameter("threshold"))?,
            sphere_radius,
            anchor: self.anchor.unwrap_or_default(),
            sequon: self
                .sequon
                .unwrap_or_else(|| Some(DEFAULT_SEQUON.to_string())),
            half_window,
            motif: self.motif.ok_or(ConfigError::MissingParameter("motif"))?,
        })
    }
}

/// Thread-count hint for the grafting builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadCount {
    All,
    Fixed(usize),
}

impl ThreadCount {
    /// Interprets a command-line style hint: `-1` means all available threads.
    pub fn from_hint(hint: i64) -> Result<Self, ConfigError> {
        match hint {
            -1 => Ok(Self::All),
            n if n > 0 => Ok(Self::Fixed(n as usize)),
            n => Err(ConfigError::InvalidValue {
                parameter: "threads",
                message: format!("expected -1 or a positive count, got {n}"),
            }),
        }
    }

    /// Number of threads to request from a pool builder; zero lets rayon decide.
    pub fn pool_size(&self) -> usize {
        match self {
            Self::All => 0,
            Self::Fixed(n) => *n,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraftConfig {
    pub rscc_threshold: f64,
    pub refine_cycles: u32,
    pub recalculation_cycles: u32,
    pub clash_distance: f64,
    pub remove_on_clash: bool,
    pub trim_on_clash: bool,
    pub threads: ThreadCount,
    pub mask_radius: f64,
}

#[derive(Default)]
pub struct GraftConfigBuilder {
    rscc_threshold: Option<f64>,
    refine_cycles: Option<u32>,
    recalculation_cycles: Option<u32>,
    clash_distance: Option<f64>,
    remove_on_clash: bool,
    trim_on_clash: bool,
    threads: Option<ThreadCount>,
    mask_radius: Option<f64>,
}

impl GraftConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rscc_threshold(mut self, threshold: f64) -> Self {
        self.rscc_threshold = Some(threshold);
        self
    }
    pub fn refine_cycles(mut self, cycles: u32) -> Self {
        self.refine_cycles = Some(cycles);
        self
    }
    pub fn recalculation_cycles(mut self, cycles: u32) -> Self {
        self.recalculation_cycles = Some(cycles);
        self
    }
    pub fn clash_distance(mut self, distance: f64) -> Self {
        self.clash_distance = Some(distance);
        self
    }
    pub fn remove_on_clash(mut self, remove: bool) -> Self {
        self.remove_on_clash = remove;
        self
    }
    pub fn trim_on_clash(mut self, trim: bool) -> Self {
        self.trim_on_clash = trim;
        self
    }
    pub fn threads(mut self, threads: ThreadCount) -> Self {
        self.threads = Some(threads);
        self
    }
    pub fn mask_radius(mut self, radius: f64) -> Self {
        self.mask_radius = Some(radius);
        self
    }

    pub fn build(self) -> Result<GraftConfig, ConfigError> {
        Ok(GraftConfig {
            rscc_threshold: self
                .rscc_threshold
                .ok_or(ConfigError::MissingParameter("rscc_threshold"))?,
            refine_cycles: self
                .refine_cycles
                .ok_or(ConfigError::MissingParameter("refine_cycles"))?,
            recalculation_cycles: self
                .recalculation_cycles
                .unwrap_or(DEFAULT_RECALCULATION_CYCLES),
            clash_distance: self.clash_distance.unwrap_or(DEFAULT_CLASH_DISTANCE),
            remove_on_clash: self.remove_on_clash,
            trim_on_clash: self.trim_on_clash,
            threads: self.threads.unwrap_or(ThreadCount::All),
            mask_radius: self.mask_radius.unwrap_or(DEFAULT_MASK_RADIUS),
        })
    }
}

/// Amplitude and phase column labels of a map coefficient pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    pub amplitude: String,
    pub phase: String,
}

impl ColumnPair {
    pub fn new(amplitude: &str, phase: &str) -> Self {
        Self {
            amplitude: amplitude.to_string(),
            phase: phase.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub program: PathBuf,
    pub sample_rate: f64,
    /// Difference-map coefficients used for blob search.
    pub difference_columns: ColumnPair,
    /// Weighted 2mFo-DFc coefficients used for RSCC after refinement.
    pub rscc_columns: ColumnPair,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gemmi"),
            sample_rate: 2.0,
            difference_columns: ColumnPair::new("DELFWT", "PHDELWT"),
            rscc_columns: ColumnPair::new("FWT", "PHWT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefmacConfig {
    pub executable: PathBuf,
    pub fp_column: String,
    pub sigfp_column: String,
    pub free_column: String,
    /// Restraint dictionary passed as `LIBIN`.
    pub library: Option<PathBuf>,
}

impl Default for RefmacConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("refmacat"),
            fp_column: "FP".to_string(),
            sigfp_column: "SIGFP".to_string(),
            free_column: "FreeR_flag".to_string(),
            library: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub workers: usize,
    pub timeout: Duration,
    pub memory_limit_bytes: Option<u64>,
}

#[derive(Default)]
pub struct BatchConfigBuilder {
    workers: Option<usize>,
    timeout: Option<Duration>,
    memory_limit_bytes: Option<Option<u64>>,
}

impl BatchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
    pub fn memory_limit_bytes(mut self, limit: Option<u64>) -> Self {
        self.memory_limit_bytes = Some(limit);
        self
    }

    pub fn build(self) -> Result<BatchConfig, ConfigError> {
        let workers = self
            .workers
            .ok_or(ConfigError::MissingParameter("workers"))?;
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "workers",
                message: "at least one worker is required".into(),
            });
        }
        Ok(BatchConfig {
            workers,
            timeout: self
                .timeout
                .ok_or(ConfigError::MissingParameter("timeout"))?,
            memory_limit_bytes: self
                .memory_limit_bytes
                .unwrap_or(Some(DEFAULT_MEMORY_LIMIT_BYTES)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrations_follow_their_lines() {
        let grafting = ThresholdCalibration::GRAFTING.threshold(2.0);
        let survey = ThresholdCalibration::SURVEY.threshold(2.0);
        assert!((grafting - 0.6662).abs() < 1e-9);
        assert!((survey - 0.5337).abs() < 1e-9);
    }

    #[test]
    fn calibration_lookup_ignores_case() {
        assert_eq!(
            ThresholdCalibration::by_name("Survey"),
            Some(ThresholdCalibration::SURVEY)
        );
        assert!(ThresholdCalibration::by_name("other").is_none());
    }

    #[test]
    fn detection_builder_requires_threshold_and_fills_defaults() {
        let missing = DetectionConfigBuilder::new()
            .sphere_radius(3.0)
            .motif("W")
            .build();
        assert_eq!(missing, Err(ConfigError::MissingParameter("threshold")));

        let config = DetectionConfigBuilder::new()
            .threshold(ThresholdPolicy::Explicit(1.0))
            .sphere_radius(DEFAULT_SPHERE_RADIUS)
            .motif(DEFAULT_MOTIF)
            .build()
            .unwrap();
        assert_eq!(config.sequon.as_deref(), Some(DEFAULT_SEQUON));
        assert_eq!(config.half_window, DEFAULT_HALF_WINDOW);
        assert_eq!(config.anchor, AnchorGeometry::default());
    }

    #[test]
    fn detection_builder_can_disable_the_sequon() {
        let config = DetectionConfigBuilder::new()
            .threshold(ThresholdPolicy::Explicit(1.0))
            .sphere_radius(3.0)
            .motif("W")
            .sequon(None)
            .build()
            .unwrap();
        assert!(config.sequon.is_none());
    }

    #[test]
    fn detection_builder_rejects_non_positive_radius() {
        let result = DetectionConfigBuilder::new()
            .threshold(ThresholdPolicy::Explicit(1.0))
            .sphere_radius(0.0)
            .motif("W")
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "sphere_radius",
                ..
            })
        ));
    }

    #[test]
    fn thread_hint_accepts_all_and_positive_counts() {
        assert_eq!(ThreadCount::from_hint(-1), Ok(ThreadCount::All));
        assert_eq!(ThreadCount::from_hint(4), Ok(ThreadCount::Fixed(4)));
        assert!(ThreadCount::from_hint(0).is_err());
        assert_eq!(ThreadCount::All.pool_size(), 0);
    }

    #[test]
    fn graft_builder_applies_defaults() {
        let config = GraftConfigBuilder::new()
            .rscc_threshold(DEFAULT_RSCC_THRESHOLD)
            .refine_cycles(DEFAULT_REFINE_CYCLES)
            .build()
            .unwrap();
        assert_eq!(config.recalculation_cycles, 0);
        assert_eq!(config.clash_distance, DEFAULT_CLASH_DISTANCE);
        assert_eq!(config.threads, ThreadCount::All);
        assert!(!config.remove_on_clash && !config.trim_on_clash);
    }

    #[test]
    fn batch_builder_rejects_zero_workers() {
        let result = BatchConfigBuilder::new()
            .workers(0)
            .timeout(DEFAULT_TIMEOUT)
            .build();
        assert!(result.is_err());
        let config = BatchConfigBuilder::new()
            .workers(DEFAULT_WORKERS)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap();
        assert_eq!(config.memory_limit_bytes, Some(DEFAULT_MEMORY_LIMIT_BYTES));
    }
}
