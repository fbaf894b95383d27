use super::reporter;
use crate::cli::{BatchArgs, ConfigArgs};
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use cmanno::core::io::store::{FailureJournal, JobStore};
use cmanno::workflows::batch::{BatchRunner, CommandFactory, UnitResult, write_summary};
use cmanno::workflows::pipeline::UnitStatus;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: BatchArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let config = build_config(&args.config, Some(&args))?;
    let store = JobStore::open(&args.store)?;
    let ids = select_ids(&store, &args.ids)?;
    if ids.is_empty() {
        println!("The job store at {} is empty.", args.store.display());
        return Ok(());
    }

    let program = std::env::current_exe()?;
    let factory = worker_command(program, args.store.clone(), forwarded_config(&args.config));
    let runner = BatchRunner::new(config.batch.clone(), factory);
    let journal = FailureJournal::new(&args.journal);

    info!(
        units = ids.len(),
        workers = config.batch.workers,
        timeout_secs = config.batch.timeout.as_secs(),
        "Starting batch run."
    );
    let reporter = reporter(&ui_sender);
    let results = tokio::task::block_in_place(|| runner.run(&ids, &journal, &reporter))?;

    if let Some(summary) = &args.summary {
        write_summary(summary, &results)?;
        info!("Batch summary written to {:?}", summary);
    }

    let count = |status: UnitStatus| {
        results
            .values()
            .filter(|r| matches!(r, UnitResult::Completed(report) if report.status == status))
            .count()
    };
    let failed = results
        .values()
        .filter(|r| r.failure_reason().is_some())
        .count();
    println!(
        "✓ {} structure(s): {} grafted, {} without targets, {} discarded, {} failed.",
        results.len(),
        count(UnitStatus::Grafted),
        count(UnitStatus::NoTargets),
        count(UnitStatus::Discarded),
        failed
    );
    if failed > 0 {
        println!("  Failures were appended to {}", args.journal.display());
    }
    Ok(())
}

/// The requested ids in store order, or every id when none were requested.
fn select_ids(store: &JobStore, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(store.records().keys().cloned().collect());
    }
    if let Some(unknown) = requested.iter().find(|id| store.get(id).is_none()) {
        return Err(CliError::Argument(format!(
            "no job '{}' in {}",
            unknown,
            store.path().display()
        )));
    }
    Ok(store
        .records()
        .keys()
        .filter(|id| requested.contains(id))
        .cloned()
        .collect())
}

/// Flags that let a worker rebuild the parent's configuration.
fn forwarded_config(config: &ConfigArgs) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if let Some(path) = &config.config {
        args.push("--config".into());
        args.push(path.as_os_str().to_owned());
    }
    if let Some(threshold) = config.threshold {
        args.push("--threshold".into());
        args.push(threshold.to_string().into());
    }
    if let Some(name) = &config.calibration {
        args.push("--calibration".into());
        args.push(name.into());
    }
    for kv in &config.set_values {
        args.push("--set".into());
        args.push(kv.into());
    }
    args
}

/// Re-invokes `program` as a quiet `run-job` worker for each unit.
fn worker_command(
    program: PathBuf,
    store: PathBuf,
    forwarded: Vec<OsString>,
) -> CommandFactory<'static> {
    Box::new(move |id: &str, scratch: &Path| {
        let mut command = Command::new(&program);
        command
            .arg("run-job")
            .arg("--quiet")
            .arg("--store")
            .arg(&store)
            .arg("--id")
            .arg(id)
            .arg("--workspace")
            .arg(scratch)
            .args(&forwarded);
        command
    })
}
