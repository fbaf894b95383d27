use super::{detect, graft};
use crate::core::io::pdb::PdbFile;
use crate::core::io::report::write_csv;
use crate::core::io::store::JobRecord;
use crate::core::io::traits::MolecularFile;
use crate::engine::config::{DetectionConfig, GraftConfig, MapConfig};
use crate::engine::error::EngineError;
use crate::engine::graft::cycle::Collaborators;
use crate::engine::progress::ProgressReporter;
use crate::engine::state::{DonorRef, GraftOutcome};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Everything a single-structure run needs besides its job record.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub detection: DetectionConfig,
    pub graft: GraftConfig,
    pub map: MapConfig,
    /// Donor used for detected targets; stored plans carry their own.
    pub donor: DonorRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitStatus {
    /// At least one graft survived and the model was written.
    Grafted,
    NoTargets,
    /// Every graft was rejected; no model was written.
    Discarded,
    Failed,
}

/// Outcome of one structure, as printed by a batch worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub id: String,
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub targets: usize,
    #[serde(default)]
    pub retained: usize,
    #[serde(default)]
    pub rejected: usize,
}

impl UnitReport {
    fn new(id: &str, status: UnitStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
            reason: None,
            targets: 0,
            retained: 0,
            rejected: 0,
        }
    }

    /// A failed unit, with the error category and message as the reason.
    pub fn failed(id: &str, error: &EngineError) -> Self {
        Self {
            reason: Some(format!("{}: {}", error.failure_reason(), error)),
            ..Self::new(id, UnitStatus::Failed)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == UnitStatus::Failed
    }
}

/// Where the per-structure summary table goes for a given output model.
pub fn summary_path(output: &Path) -> PathBuf {
    output.with_extension("csv")
}

/// Runs detection, grafting and validation for one structure.
///
/// Targets come from the job's stored plan when it has one, otherwise from detection
/// on the difference map. A validated model is written to the job's output path with a
/// CSV summary next to it. When the structure is discarded, finds nothing or fails,
/// any output left from an earlier run is deleted, so a present output file is always a
/// validated one.
///
/// # Errors
///
/// Returns the first error that abandoned the structure.
#[instrument(skip_all, name = "pipeline", fields(id = %id))]
pub fn run_unit(
    id: &str,
    job: &JobRecord,
    collaborators: Collaborators,
    config: &PipelineConfig,
    workspace: &Path,
    reporter: &ProgressReporter,
) -> Result<UnitReport, EngineError> {
    let result = execute(id, job, collaborators, config, workspace, reporter);
    match &result {
        Ok(report) if report.status == UnitStatus::Grafted => {}
        Ok(_) => remove_stale_outputs(&job.output_path),
        Err(e) => {
            warn!(error = %e, "Structure abandoned.");
            remove_stale_outputs(&job.output_path);
        }
    }
    result
}

fn execute(
    id: &str,
    job: &JobRecord,
    collaborators: Collaborators,
    config: &PipelineConfig,
    workspace: &Path,
    reporter: &ProgressReporter,
) -> Result<UnitReport, EngineError> {
    // === Phase 1: Load the receiver ===
    let structure = PdbFile::read_from_path(&job.receiver_path).map_err(|source| {
        EngineError::ModelRead {
            path: job.receiver_path.clone(),
            source,
        }
    })?;
    create_dir(workspace)?;

    // === Phase 2: Targets ===
    let targets = if job.glycosylations.is_empty() {
        let map_dir = workspace.join("detect");
        create_dir(&map_dir)?;
        let columns = &config.map.difference_columns;
        let grid = collaborators.transform.compute_map(
            &job.mtz_path,
            &columns.amplitude,
            &columns.phase,
            &map_dir,
        )?;
        detect::run(&structure, &grid, &config.detection, &config.donor, reporter)?.targets
    } else {
        graft::targets_from_plan(&structure, &job.glycosylations)
    };
    if targets.is_empty() {
        info!("No graft targets.");
        return Ok(UnitReport::new(id, UnitStatus::NoTargets));
    }

    // === Phase 3: Graft cycle ===
    let report = graft::run(
        structure,
        &targets,
        &job.mtz_path,
        &workspace.join("graft"),
        collaborators,
        &config.graft,
        &config.map,
        reporter,
    )?;
    let mut unit = UnitReport {
        targets: targets.len(),
        retained: report.retained().count(),
        rejected: report.rejected().count(),
        ..UnitReport::new(id, UnitStatus::Discarded)
    };

    // === Phase 4: Outputs ===
    let Some(validated) = &report.structure else {
        info!(rejected = unit.rejected, "No graft survived validation.");
        return Ok(unit);
    };
    if let Some(parent) = job.output_path.parent() {
        create_dir(parent)?;
    }
    PdbFile::write_to_path(validated, &job.output_path).map_err(|source| {
        EngineError::ModelWrite {
            path: job.output_path.clone(),
            source,
        }
    })?;
    let summary = summary_path(&job.output_path);
    let rows: Vec<_> = report.outcomes.iter().map(GraftOutcome::summary_row).collect();
    write_csv(&summary, &rows).map_err(|source| EngineError::Report {
        path: summary.clone(),
        source,
    })?;
    unit.status = UnitStatus::Grafted;
    info!(
        retained = unit.retained,
        rejected = unit.rejected,
        output = %job.output_path.display(),
        "Validated model written."
    );
    Ok(unit)
}

fn create_dir(path: &Path) -> Result<(), EngineError> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_stale_outputs(output: &Path) {
    for path in [output.to_path_buf(), summary_path(output)] {
        if path.is_file() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Could not delete stale output.");
            }
        }
    }
}
