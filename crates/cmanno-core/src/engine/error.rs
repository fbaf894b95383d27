use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;
use crate::core::density::DensityError;
use crate::core::io::pdb::PdbError;
use crate::core::io::store::StoreError;
use crate::core::models::ids::ResidueKey;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Structure '{structure}' reports no resolution; a calibrated threshold needs one")]
    MissingResolution { structure: String },

    #[error("Invalid sequence pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to read model '{path}': {source}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: PdbError,
    },

    #[error("Failed to write model '{path}': {source}")]
    ModelWrite {
        path: PathBuf,
        #[source]
        source: PdbError,
    },

    #[error("Density map error: {0}")]
    Density(#[from] DensityError),

    #[error("External program '{tool}' was not found")]
    ToolNotFound { tool: String },

    #[error("External program '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Failed to attach glycan at {target}: {message}")]
    Attach { target: ResidueKey, message: String },

    #[error("Refinement failed: {0}")]
    Refinement(String),

    #[error("Persisted state error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to write report '{path}': {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

/// Coarse category of a failed unit of work, as recorded in the failure journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    MissingInput,
    InvalidConfiguration,
    ToolUnavailable,
    ToolFailure,
    AttachFailure,
    RefinementFailure,
    Timeout,
    WorkerCrashed,
    Internal,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingInput => "missing or unreadable input",
            Self::InvalidConfiguration => "invalid configuration",
            Self::ToolUnavailable => "external program unavailable",
            Self::ToolFailure => "external program failed",
            Self::AttachFailure => "glycan could not be attached",
            Self::RefinementFailure => "refinement produced no output",
            Self::Timeout => "timeout",
            Self::WorkerCrashed => "worker crashed",
            Self::Internal => "internal error",
        };
        f.write_str(text)
    }
}

impl EngineError {
    /// Maps the error onto the category recorded for the failed unit.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::Config(_) | Self::MissingResolution { .. } | Self::InvalidPattern { .. } => {
                FailureReason::InvalidConfiguration
            }
            Self::ModelRead { .. } | Self::Density(_) | Self::Store(_) => {
                FailureReason::MissingInput
            }
            Self::ToolNotFound { .. } => FailureReason::ToolUnavailable,
            Self::ToolFailed { .. } => FailureReason::ToolFailure,
            Self::Attach { .. } => FailureReason::AttachFailure,
            Self::Refinement(_) => FailureReason::RefinementFailure,
            Self::ModelWrite { .. } | Self::Report { .. } | Self::Io { .. } => {
                FailureReason::ToolFailure
            }
            Self::Internal(_) => FailureReason::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refinement_errors_map_to_refinement_failure() {
        let err = EngineError::Refinement("XYZOUT missing".into());
        assert_eq!(err.failure_reason(), FailureReason::RefinementFailure);
        assert_eq!(
            err.failure_reason().to_string(),
            "refinement produced no output"
        );
    }

    #[test]
    fn missing_tool_is_distinguished_from_tool_failure() {
        let missing = EngineError::ToolNotFound {
            tool: "refmacat".into(),
        };
        let failed = EngineError::ToolFailed {
            tool: "gemmi".into(),
            message: "exit status 1".into(),
        };
        assert_eq!(missing.failure_reason(), FailureReason::ToolUnavailable);
        assert_eq!(failed.failure_reason(), FailureReason::ToolFailure);
    }

    #[test]
    fn failure_reason_serializes_in_kebab_case() {
        let json = serde_json::to_string(&FailureReason::AttachFailure).unwrap();
        assert_eq!(json, "\"attach-failure\"");
    }
}
