use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileAnchorConfig {
    pub residue: Option<String>,
    pub reference_atom: Option<String>,
    pub direction_atom: Option<String>,
    pub length: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileDetectionConfig {
    pub threshold: Option<f64>,
    pub calibration: Option<String>,
    pub sphere_radius: Option<f64>,
    /// An empty pattern disables the sequence-context filter.
    pub sequon: Option<String>,
    pub half_window: Option<usize>,
    pub motif: Option<String>,
    pub anchor: Option<FileAnchorConfig>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileGraftConfig {
    pub donor: Option<PathBuf>,
    pub glycan_index: Option<usize>,
    pub rscc_threshold: Option<f64>,
    pub recalculation_cycles: Option<u32>,
    pub clash_distance: Option<f64>,
    pub remove_on_clash: Option<bool>,
    pub trim_on_clash: Option<bool>,
    /// `-1` for every available core.
    pub threads: Option<i64>,
    pub mask_radius: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRefinementConfig {
    pub executable: Option<PathBuf>,
    pub cycles: Option<u32>,
    pub library: Option<PathBuf>,
    pub fp_column: Option<String>,
    pub sigfp_column: Option<String>,
    pub free_column: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMapConfig {
    pub program: Option<PathBuf>,
    pub sample_rate: Option<f64>,
    pub difference_columns: Option<[String; 2]>,
    pub rscc_columns: Option<[String; 2]>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileBatchConfig {
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    /// `0` disables the cap.
    pub memory_mib: Option<u64>,
}

/// The TOML configuration file. Every section and key is optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub detection: Option<FileDetectionConfig>,
    pub graft: Option<FileGraftConfig>,
    pub refinement: Option<FileRefinementConfig>,
    pub map: Option<FileMapConfig>,
    pub batch: Option<FileBatchConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Applies `-S KEY=VALUE` overrides on top of the file values.
    ///
    /// Setting an explicit threshold clears a calibration from the file and vice versa.
    pub fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "detection.threshold" => {
                    let detection = self.detection.get_or_insert_with(Default::default);
                    detection.threshold = Some(parse_value(key, value_str)?);
                    detection.calibration = None;
                }
                "detection.calibration" => {
                    let detection = self.detection.get_or_insert_with(Default::default);
                    detection.calibration = Some(value_str.to_string());
                    detection.threshold = None;
                }
                "detection.sphere-radius" => {
                    self.detection
                        .get_or_insert_with(Default::default)
                        .sphere_radius = Some(parse_value(key, value_str)?);
                }
                "graft.rscc-threshold" => {
                    self.graft.get_or_insert_with(Default::default).rscc_threshold =
                        Some(parse_value(key, value_str)?);
                }
                "graft.clash-distance" => {
                    self.graft.get_or_insert_with(Default::default).clash_distance =
                        Some(parse_value(key, value_str)?);
                }
                "refinement.cycles" => {
                    self.refinement.get_or_insert_with(Default::default).cycles =
                        Some(parse_value(key, value_str)?);
                }
                "batch.workers" => {
                    self.batch.get_or_insert_with(Default::default).workers =
                        Some(parse_value(key, value_str)?);
                }
                "batch.timeout-secs" => {
                    self.batch.get_or_insert_with(Default::default).timeout_secs =
                        Some(parse_value(key, value_str)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            std::any::type_name::<T>(),
            key,
            value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_sections() {
        let config: FileConfig = toml::from_str(
            r#"
            [detection]
            calibration = "survey"
            sphere-radius = 2.5
            sequon = ""

            [detection.anchor]
            length = 6.0

            [graft]
            rscc-threshold = 0.6
            threads = -1

            [map]
            difference-columns = ["DELFWT", "PHDELWT"]

            [batch]
            memory-mib = 0
            "#,
        )
        .unwrap();

        let detection = config.detection.unwrap();
        assert_eq!(detection.calibration.as_deref(), Some("survey"));
        assert_eq!(detection.sphere_radius, Some(2.5));
        assert_eq!(detection.sequon.as_deref(), Some(""));
        assert_eq!(detection.anchor.unwrap().length, Some(6.0));
        assert_eq!(config.graft.unwrap().threads, Some(-1));
        assert_eq!(config.batch.unwrap().memory_mib, Some(0));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<FileConfig, _> = toml::from_str(
            r#"
            [graft]
            rscc = 0.6
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn set_threshold_replaces_file_calibration() {
        let mut config = FileConfig {
            detection: Some(FileDetectionConfig {
                calibration: Some("survey".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        config
            .apply_set_values(&["detection.threshold=0.75".into(), "batch.workers=8".into()])
            .unwrap();

        let detection = config.detection.as_ref().unwrap();
        assert_eq!(detection.threshold, Some(0.75));
        assert!(detection.calibration.is_none());
        assert_eq!(config.batch.unwrap().workers, Some(8));
    }

    #[test]
    fn malformed_set_values_are_config_errors() {
        let mut config = FileConfig::default();
        assert!(matches!(
            config.apply_set_values(&["refinement.cycles".into()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["refinement.cycles=many".into()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["graft.donor=x.pdb".into()]),
            Err(CliError::Config(msg)) if msg.contains("graft.donor")
        ));
    }
}
