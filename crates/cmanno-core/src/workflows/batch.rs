use super::pipeline::{UnitReport, UnitStatus};
use crate::core::io::report::write_csv;
use crate::core::io::store::FailureJournal;
use crate::engine::config::BatchConfig;
use crate::engine::error::{EngineError, FailureReason};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::utils::process::last_line;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Builds the worker command for a structure id, given the worker's scratch directory.
pub type CommandFactory<'a> = Box<dyn Fn(&str, &Path) -> Command + Send + Sync + 'a>;

/// What became of one unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitResult {
    /// The worker ran to completion and reported back.
    Completed(UnitReport),
    /// The worker was killed or died without a report.
    Failed { reason: String },
}

impl UnitResult {
    /// The journal reason, when this unit failed.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Completed(report) if report.is_failure() => {
                Some(report.reason.as_deref().unwrap_or("worker reported a failure"))
            }
            Self::Completed(_) => None,
            Self::Failed { reason } => Some(reason),
        }
    }
}

/// One line of the run-level summary table.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRow {
    pub id: String,
    pub status: String,
    pub reason: String,
    pub targets: usize,
    pub retained: usize,
    pub rejected: usize,
}

pub fn summary_rows(results: &BTreeMap<String, UnitResult>) -> Vec<BatchRow> {
    results
        .iter()
        .map(|(id, result)| match result {
            UnitResult::Completed(report) => BatchRow {
                id: id.clone(),
                status: serde_json::to_value(report.status)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default(),
                reason: report.reason.clone().unwrap_or_default(),
                targets: report.targets,
                retained: report.retained,
                rejected: report.rejected,
            },
            UnitResult::Failed { reason } => BatchRow {
                id: id.clone(),
                status: "failed".to_string(),
                reason: reason.clone(),
                targets: 0,
                retained: 0,
                rejected: 0,
            },
        })
        .collect()
}

/// Writes the run-level summary table.
pub fn write_summary(path: &Path, results: &BTreeMap<String, UnitResult>) -> Result<(), EngineError> {
    write_csv(path, &summary_rows(results)).map_err(|source| EngineError::Report {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs every structure in its own child process on a fixed-size worker pool.
///
/// Each child gets a private scratch directory that is removed however the child ends.
/// A child that outlives the timeout is killed together with every tool it started. On
/// unix the child also runs under a virtual-memory cap. Nothing is retried; each failure
/// is appended to the journal as soon as its unit ends.
pub struct BatchRunner<'a> {
    config: BatchConfig,
    factory: CommandFactory<'a>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: BatchConfig, factory: CommandFactory<'a>) -> Self {
        Self { config, factory }
    }

    /// Runs `ids` and returns their results keyed by id.
    ///
    /// # Errors
    ///
    /// Returns an error only when the pool cannot be built or the journal cannot be
    /// written; individual unit failures are results, not errors.
    #[instrument(skip_all, name = "batch", fields(units = ids.len(), workers = self.config.workers))]
    pub fn run(
        &self,
        ids: &[String],
        journal: &FailureJournal,
        reporter: &ProgressReporter,
    ) -> Result<BTreeMap<String, UnitResult>, EngineError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build worker pool: {e}")))?;

        reporter.phase("Batch");
        reporter.report(Progress::TaskStart {
            total: ids.len() as u64,
        });
        let journal = Mutex::new(journal);
        let journal_error: Mutex<Option<EngineError>> = Mutex::new(None);
        let results: BTreeMap<String, UnitResult> = pool.install(|| {
            ids.par_iter()
                .map(|id| {
                    let result = self.run_one(id);
                    if let Some(reason) = result.failure_reason() {
                        warn!(id = %id, reason = %reason, "Unit failed.");
                        let appended = journal
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .append(id, reason);
                        if let Err(e) = appended {
                            let mut slot =
                                journal_error.lock().unwrap_or_else(PoisonError::into_inner);
                            if slot.is_none() {
                                *slot = Some(EngineError::from(e));
                            }
                        }
                    }
                    reporter.report(Progress::TaskIncrement { amount: 1 });
                    (id.clone(), result)
                })
                .collect()
        });
        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);

        if let Some(e) = journal_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(e);
        }
        let failures = results
            .values()
            .filter(|r| r.failure_reason().is_some())
            .count();
        info!(
            completed = results.len() - failures,
            failed = failures,
            "Batch finished."
        );
        Ok(results)
    }

    fn run_one(&self, id: &str) -> UnitResult {
        self.supervise(id).unwrap_or_else(|e| UnitResult::Failed {
            reason: format!("{}: {}", e.failure_reason(), e),
        })
    }

    fn supervise(&self, id: &str) -> Result<UnitResult, EngineError> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("cmanno-{id}-"))
            .tempdir()
            .map_err(|source| EngineError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let stdout_path = scratch.path().join("worker.out");
        let stderr_path = scratch.path().join("worker.err");
        let mut command = (self.factory)(id, scratch.path());
        if let Some(limit) = self.config.memory_limit_bytes {
            command = with_memory_limit(command, limit);
        }
        isolate(&mut command);
        command
            .stdin(Stdio::null())
            .stdout(File::create(&stdout_path).map_err(io_error(&stdout_path))?)
            .stderr(File::create(&stderr_path).map_err(io_error(&stderr_path))?);
        debug!(id, command = ?command, "Starting worker.");

        let program = PathBuf::from(command.get_program());
        let mut child = command.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                EngineError::ToolNotFound {
                    tool: program.display().to_string(),
                }
            } else {
                EngineError::Io {
                    path: program.clone(),
                    source,
                }
            }
        })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait().map_err(io_error(&program))? {
                break status;
            }
            if started.elapsed() >= self.config.timeout {
                if let Err(e) = kill_worker(&mut child) {
                    warn!(id, error = %e, "Could not kill timed-out worker.");
                }
                let _ = child.wait();
                return Ok(UnitResult::Failed {
                    reason: FailureReason::Timeout.to_string(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = fs::read(&stdout_path).map_err(io_error(&stdout_path))?;
        match serde_json::from_str::<UnitReport>(&last_line(&stdout)) {
            Ok(report) => {
                if report.status == UnitStatus::Failed {
                    debug!(id, "Worker reported a failure.");
                }
                Ok(UnitResult::Completed(report))
            }
            Err(_) => {
                let stderr = fs::read(&stderr_path).unwrap_or_default();
                debug!(id, stderr = %last_line(&stderr), "Worker left no report.");
                Ok(UnitResult::Failed {
                    reason: format!("worker exited with status {status}"),
                })
            }
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> EngineError {
    let path = path.to_path_buf();
    move |source| EngineError::Io { path, source }
}

/// Starts the worker as the leader of a new process group.
#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

/// Kills the worker's whole process group, including refinement and map tools.
#[cfg(unix)]
fn kill_worker(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = Pid::from_raw(child.id() as i32);
    killpg(group, Signal::SIGKILL).or_else(|errno| {
        debug!(error = %errno, "Process group already gone, killing the worker alone.");
        child.kill()
    })
}

#[cfg(not(unix))]
fn kill_worker(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

/// Wraps `command` so it runs under a virtual-memory cap of `bytes`.
#[cfg(unix)]
fn with_memory_limit(command: Command, bytes: u64) -> Command {
    let mut wrapped = Command::new("sh");
    wrapped
        .arg("-c")
        .arg(format!("ulimit -v {}; exec \"$0\" \"$@\"", bytes / 1024))
        .arg(command.get_program())
        .args(command.get_args());
    if let Some(dir) = command.get_current_dir() {
        wrapped.current_dir(dir);
    }
    for (key, value) in command.get_envs() {
        match value {
            Some(value) => wrapped.env(key, value),
            None => wrapped.env_remove(key),
        };
    }
    wrapped
}

#[cfg(not(unix))]
fn with_memory_limit(command: Command, _bytes: u64) -> Command {
    command
}
