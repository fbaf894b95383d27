use super::{Toolchain, reporter};
use crate::cli::RunJobArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use cmanno::core::io::store::JobStore;
use cmanno::engine::error::FailureReason;
use cmanno::engine::state::DonorRef;
use cmanno::workflows::pipeline::{self, PipelineConfig, UnitReport, UnitStatus};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Worker entry point of a batch run.
///
/// The JSON report is always the last line on stdout, failures included; everything
/// else goes to stderr.
pub async fn run(args: RunJobArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let report = execute(&args, &ui_sender).unwrap_or_else(|e| failure_report(&args.id, &e));
    let line = serde_json::to_string(&report).map_err(|e| CliError::Other(e.into()))?;
    println!("{}", line);

    if report.is_failure() {
        return Err(CliError::Other(anyhow::anyhow!(
            "structure '{}' failed: {}",
            args.id,
            report.reason.as_deref().unwrap_or("unknown reason")
        )));
    }
    Ok(())
}

fn execute(args: &RunJobArgs, ui_sender: &mpsc::Sender<UiEvent>) -> Result<UnitReport> {
    let store = JobStore::open(&args.store)?;
    let job = store.get(&args.id).ok_or_else(|| {
        CliError::Argument(format!(
            "no job '{}' in {}",
            args.id,
            store.path().display()
        ))
    })?;
    let config = build_config(&args.config, None)?;

    // Stored plans name their own donors; only detected targets use the configured one.
    let donor = match (config.donor.clone(), job.glycosylations.is_empty()) {
        (Some(donor), _) => donor,
        (None, false) => DonorRef {
            path: PathBuf::new(),
            glycan_index: 0,
        },
        (None, true) => return Err(super::missing_donor()),
    };
    let pipeline_config = PipelineConfig {
        detection: config.detection.clone(),
        graft: config.graft.clone(),
        map: config.map.clone(),
        donor,
    };
    let toolchain = Toolchain::new(&config)?;
    let reporter = reporter(ui_sender);

    let report = tokio::task::block_in_place(|| {
        pipeline::run_unit(
            &args.id,
            job,
            toolchain.collaborators(),
            &pipeline_config,
            &args.workspace,
            &reporter,
        )
    })?;
    Ok(report)
}

fn failure_report(id: &str, error: &CliError) -> UnitReport {
    let category = match error {
        CliError::Core(e) => return UnitReport::failed(id, e),
        CliError::Config(_) | CliError::Argument(_) => FailureReason::InvalidConfiguration,
        CliError::Store(_) | CliError::FileParsing { .. } | CliError::Io(_) => {
            FailureReason::MissingInput
        }
        CliError::Other(_) => FailureReason::Internal,
    };
    UnitReport {
        id: id.to_string(),
        status: UnitStatus::Failed,
        reason: Some(format!("{}: {}", category, error)),
        targets: 0,
        retained: 0,
        rejected: 0,
    }
}
