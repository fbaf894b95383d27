use crate::engine::error::EngineError;
use std::ffi::OsStr;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

fn tool_name(program: &Path) -> String {
    program.display().to_string()
}

/// Resolves `path` against the current directory.
///
/// Tools run inside their own workspace, so every path handed to them must be absolute.
pub fn absolute_path(path: &Path) -> Result<PathBuf, EngineError> {
    std::path::absolute(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs an external program to completion, optionally feeding `stdin`.
///
/// A program given as a bare name is looked up on `PATH`; one given with a directory
/// is resolved against the caller's directory, not `working_dir`.
///
/// # Errors
///
/// Returns [`EngineError::ToolNotFound`] when the program cannot be found and
/// [`EngineError::ToolFailed`] when it cannot be spawned or waited on. A non-zero
/// exit status is not an error here; callers decide from the output.
pub fn run_tool<I, S>(
    program: &Path,
    args: I,
    stdin: Option<&str>,
    working_dir: &Path,
) -> Result<Output, EngineError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let resolved;
    let program = if program.components().count() > 1 {
        resolved = absolute_path(program)?;
        resolved.as_path()
    } else {
        program
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(working_dir)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!(command = ?cmd, "Running external program.");

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            EngineError::ToolNotFound {
                tool: tool_name(program),
            }
        } else {
            EngineError::ToolFailed {
                tool: tool_name(program),
                message: format!("could not spawn: {e}"),
            }
        }
    })?;

    if let (Some(text), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(text.as_bytes())
            .map_err(|e| EngineError::ToolFailed {
                tool: tool_name(program),
                message: format!("could not write keywords to stdin: {e}"),
            })?;
    }

    child.wait_with_output().map_err(|e| EngineError::ToolFailed {
        tool: tool_name(program),
        message: format!("could not wait for process: {e}"),
    })
}

/// Last non-empty line of a captured stream, for error messages.
pub fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}
