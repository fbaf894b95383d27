use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileDetectionConfig};
use super::models::AppConfig;
use crate::cli::{BatchArgs, ConfigArgs};
use crate::error::{CliError, Result};
use cmanno::engine::anchor::AnchorGeometry;
use cmanno::engine::config::{
    self as core_config, BatchConfigBuilder, ColumnPair, DetectionConfigBuilder,
    GraftConfigBuilder, ThreadCount, ThresholdCalibration, ThresholdPolicy,
};
use cmanno::engine::state::DonorRef;
use std::time::Duration;
use tracing::debug;

/// Resolves the configuration for one invocation.
///
/// Precedence, highest first: command-line flags, `-S` overrides, the config file,
/// built-in defaults. `batch` carries the batch-only flags when the caller has them.
pub fn build_config(args: &ConfigArgs, batch: Option<&BatchArgs>) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let mut file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    file_config.apply_set_values(&args.set_values)?;
    debug!("Configuration after overrides: {:?}", file_config);

    let detection_file = file_config.detection.take().unwrap_or_default();
    let graft_file = file_config.graft.take().unwrap_or_default();
    let refine_file = file_config.refinement.take().unwrap_or_default();
    let map_file = file_config.map.take().unwrap_or_default();
    let batch_file = file_config.batch.take().unwrap_or_default();

    // === Detection ===
    let threshold = resolve_threshold(args, &detection_file, &defaults)?;
    let anchor_file = detection_file.anchor.clone().unwrap_or_default();
    let base_anchor = AnchorGeometry::default();
    let anchor = AnchorGeometry {
        residue_name: anchor_file.residue.unwrap_or(base_anchor.residue_name),
        reference_atom: anchor_file
            .reference_atom
            .unwrap_or(base_anchor.reference_atom),
        direction_atom: anchor_file
            .direction_atom
            .unwrap_or(base_anchor.direction_atom),
        length: anchor_file.length.unwrap_or(base_anchor.length),
    };
    let mut detection_builder = DetectionConfigBuilder::new()
        .threshold(threshold)
        .sphere_radius(
            detection_file
                .sphere_radius
                .unwrap_or(defaults.sphere_radius),
        )
        .anchor(anchor)
        .motif(detection_file.motif.unwrap_or(defaults.motif));
    if let Some(sequon) = detection_file.sequon {
        detection_builder =
            detection_builder.sequon(Some(sequon).filter(|pattern| !pattern.is_empty()));
    }
    if let Some(half_window) = detection_file.half_window {
        detection_builder = detection_builder.half_window(half_window);
    }
    let detection = detection_builder.build().map_err(config_error)?;

    // === Grafting ===
    let threads = match graft_file.threads {
        Some(hint) => ThreadCount::from_hint(hint).map_err(config_error)?,
        None => ThreadCount::All,
    };
    let mut graft_builder = GraftConfigBuilder::new()
        .rscc_threshold(
            graft_file
                .rscc_threshold
                .unwrap_or(defaults.rscc_threshold),
        )
        .refine_cycles(refine_file.cycles.unwrap_or(defaults.refine_cycles))
        .remove_on_clash(graft_file.remove_on_clash.unwrap_or(false))
        .trim_on_clash(graft_file.trim_on_clash.unwrap_or(false))
        .threads(threads);
    if let Some(cycles) = graft_file.recalculation_cycles {
        graft_builder = graft_builder.recalculation_cycles(cycles);
    }
    if let Some(distance) = graft_file.clash_distance {
        graft_builder = graft_builder.clash_distance(distance);
    }
    if let Some(radius) = graft_file.mask_radius {
        graft_builder = graft_builder.mask_radius(radius);
    }
    let graft = graft_builder.build().map_err(config_error)?;
    let donor = graft_file.donor.map(|path| DonorRef {
        path,
        glycan_index: graft_file.glycan_index.unwrap_or(defaults.glycan_index),
    });

    // === External programs ===
    let base_refmac = core_config::RefmacConfig::default();
    let refmac = core_config::RefmacConfig {
        executable: refine_file.executable.unwrap_or(base_refmac.executable),
        fp_column: refine_file.fp_column.unwrap_or(base_refmac.fp_column),
        sigfp_column: refine_file.sigfp_column.unwrap_or(base_refmac.sigfp_column),
        free_column: refine_file.free_column.unwrap_or(base_refmac.free_column),
        library: refine_file.library.or(base_refmac.library),
    };
    let base_map = core_config::MapConfig::default();
    let map = core_config::MapConfig {
        program: map_file.program.unwrap_or(base_map.program),
        sample_rate: map_file.sample_rate.unwrap_or(base_map.sample_rate),
        difference_columns: map_file
            .difference_columns
            .map(|[f, phi]| ColumnPair::new(&f, &phi))
            .unwrap_or(base_map.difference_columns),
        rscc_columns: map_file
            .rscc_columns
            .map(|[f, phi]| ColumnPair::new(&f, &phi))
            .unwrap_or(base_map.rscc_columns),
    };

    // === Batch ===
    let workers = batch
        .and_then(|b| b.workers)
        .or(batch_file.workers)
        .unwrap_or(defaults.workers);
    let timeout_secs = batch
        .and_then(|b| b.timeout_secs)
        .or(batch_file.timeout_secs)
        .unwrap_or(defaults.timeout_secs);
    let memory_mib = batch
        .and_then(|b| b.memory_mib)
        .or(batch_file.memory_mib)
        .unwrap_or(defaults.memory_mib);
    let batch = BatchConfigBuilder::new()
        .workers(workers)
        .timeout(Duration::from_secs(timeout_secs))
        .memory_limit_bytes((memory_mib > 0).then(|| memory_mib * 1024 * 1024))
        .build()
        .map_err(config_error)?;

    Ok(AppConfig {
        detection,
        graft,
        refmac,
        map,
        batch,
        donor,
    })
}

fn resolve_threshold(
    args: &ConfigArgs,
    file: &FileDetectionConfig,
    defaults: &DefaultsConfig,
) -> Result<ThresholdPolicy> {
    if let Some(threshold) = args.threshold {
        return Ok(ThresholdPolicy::Explicit(threshold));
    }
    if let Some(name) = &args.calibration {
        return calibration(name).map(ThresholdPolicy::Calibrated);
    }
    match (file.threshold, &file.calibration) {
        (Some(_), Some(_)) => Err(CliError::Config(
            "`detection.threshold` and `detection.calibration` are mutually exclusive."
                .to_string(),
        )),
        (Some(threshold), None) => Ok(ThresholdPolicy::Explicit(threshold)),
        (None, Some(name)) => calibration(name).map(ThresholdPolicy::Calibrated),
        (None, None) => Ok(ThresholdPolicy::Calibrated(defaults.calibration)),
    }
}

fn calibration(name: &str) -> Result<ThresholdCalibration> {
    ThresholdCalibration::by_name(name).ok_or_else(|| {
        CliError::Config(format!(
            "Unknown threshold calibration '{}'. Expected 'grafting' or 'survey'.",
            name
        ))
    })
}

fn config_error(e: core_config::ConfigError) -> CliError {
    CliError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn batch_args(config_path: &Path, extra: &[&str]) -> BatchArgs {
        let mut args = vec![
            "cmanno",
            "batch",
            "--store",
            "jobs.json",
            "--journal",
            "failed.txt",
            "-c",
            config_path.to_str().unwrap(),
        ];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Batch(args) => args,
            _ => panic!("Expected 'batch' subcommand"),
        }
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let config = build_config(&ConfigArgs::default(), None).unwrap();

        assert_eq!(
            config.detection.threshold,
            ThresholdPolicy::Calibrated(ThresholdCalibration::GRAFTING)
        );
        assert_eq!(config.detection.sphere_radius, 3.0);
        assert_eq!(config.detection.sequon.as_deref(), Some("W.{2}W"));
        assert_eq!(config.graft.rscc_threshold, 0.5);
        assert_eq!(config.graft.refine_cycles, 20);
        assert_eq!(config.map.difference_columns, ColumnPair::new("DELFWT", "PHDELWT"));
        assert_eq!(config.batch.workers, 128);
        assert_eq!(config.batch.timeout, Duration::from_secs(180));
        assert_eq!(config.batch.memory_limit_bytes, Some(10 * 1024 * 1024 * 1024));
        assert!(config.donor.is_none());
    }

    #[test]
    fn file_values_are_layered_under_cli_flags() {
        let config_path = write_config_file(
            "layered.toml",
            r#"
            [detection]
            calibration = "survey"
            sequon = ""

            [graft]
            donor = "donors/man.pdb"
            glycan-index = 1
            rscc-threshold = 0.7

            [refinement]
            cycles = 5
            executable = "/opt/ccp4/bin/refmac5"

            [batch]
            workers = 16
            timeout-secs = 60
            "#,
        );
        let args = batch_args(&config_path, &["-w", "4", "--memory-mib", "0"]);

        let config = build_config(&args.config, Some(&args)).unwrap();

        assert_eq!(
            config.detection.threshold,
            ThresholdPolicy::Calibrated(ThresholdCalibration::SURVEY)
        );
        assert!(config.detection.sequon.is_none());
        assert_eq!(config.graft.rscc_threshold, 0.7);
        assert_eq!(config.graft.refine_cycles, 5);
        assert_eq!(config.refmac.executable, PathBuf::from("/opt/ccp4/bin/refmac5"));
        assert_eq!(
            config.donor,
            Some(DonorRef {
                path: PathBuf::from("donors/man.pdb"),
                glycan_index: 1,
            })
        );
        assert_eq!(config.batch.workers, 4);
        assert_eq!(config.batch.timeout, Duration::from_secs(60));
        assert!(config.batch.memory_limit_bytes.is_none());
    }

    #[test]
    fn explicit_threshold_flag_beats_file_calibration() {
        let config_path = write_config_file(
            "threshold.toml",
            r#"
            [detection]
            calibration = "survey"
            "#,
        );
        let args = batch_args(&config_path, &["-t", "1.25"]);

        let config = build_config(&args.config, Some(&args)).unwrap();
        assert_eq!(config.detection.threshold, ThresholdPolicy::Explicit(1.25));
    }

    #[test]
    fn set_values_override_the_file() {
        let config_path = write_config_file(
            "set.toml",
            r#"
            [graft]
            rscc-threshold = 0.7
            "#,
        );
        let args = batch_args(
            &config_path,
            &["-S", "graft.rscc-threshold=0.4", "-S", "batch.timeout-secs=30"],
        );

        let config = build_config(&args.config, Some(&args)).unwrap();
        assert_eq!(config.graft.rscc_threshold, 0.4);
        assert_eq!(config.batch.timeout, Duration::from_secs(30));
    }

    #[test]
    fn conflicting_or_unknown_threshold_sources_are_rejected() {
        let both = write_config_file(
            "both.toml",
            r#"
            [detection]
            threshold = 0.5
            calibration = "grafting"
            "#,
        );
        let args = batch_args(&both, &[]);
        assert!(matches!(
            build_config(&args.config, Some(&args)),
            Err(CliError::Config(_))
        ));

        let unknown = ConfigArgs {
            calibration: Some("cryo".into()),
            ..Default::default()
        };
        assert!(matches!(
            build_config(&unknown, None),
            Err(CliError::Config(msg)) if msg.contains("cryo")
        ));
    }

    #[test]
    fn invalid_values_surface_as_config_errors() {
        let config_path = write_config_file(
            "invalid.toml",
            r#"
            [graft]
            threads = 0
            "#,
        );
        let args = batch_args(&config_path, &[]);
        assert!(matches!(
            build_config(&args.config, Some(&args)),
            Err(CliError::Config(_))
        ));

        let zero_workers = batch_args(&write_config_file("empty.toml", ""), &["-w", "0"]);
        assert!(matches!(
            build_config(&zero_workers.config, Some(&zero_workers)),
            Err(CliError::Config(_))
        ));
    }
}
