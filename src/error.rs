//! Error types for the remediation drive.
//!
//! Per-issue failures (`Transformation`, `ValidationTool`, `Workspace`,
//! `Timeout`) are contained by the executor and surface as attempt outcomes.
//! Only ingest can fail a whole run, and only when no report parses at all.
//!
//! The classifier is total, so there is no ambiguous-classification variant.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for remediation runs.
#[derive(Error, Debug)]
pub enum Error {
    /// A raw report could not be parsed at all.
    #[error("malformed report {origin}: {reason}")]
    MalformedReport { origin: String, reason: String },

    /// None of the supplied reports could be parsed.
    #[error("no usable reports: {0} supplied, all malformed")]
    NoUsableReports(usize),

    /// A fix strategy failed to transform its inputs.
    #[error("transformation failed for {issue_id}: {reason}")]
    Transformation { issue_id: String, reason: String },

    /// A validation tool errored instead of producing a verdict.
    #[error("validation tool '{tool}' failed: {reason}")]
    ValidationTool { tool: String, reason: String },

    /// The consecutive-failure budget of a phase was exhausted.
    #[error("phase {phase} aborted after {failures} consecutive failures")]
    PhaseAborted { phase: String, failures: u32 },

    /// Workspace creation, commit or discard failed.
    #[error("workspace {workspace}: {reason}")]
    Workspace { workspace: String, reason: String },

    /// A suspension point exceeded its time budget.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    /// Git operation failed.
    #[error("git operation failed: {0}")]
    Git(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The path is not usable for the requested operation.
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),
}

impl Error {
    /// Returns true for errors that belong to a single issue attempt.
    pub fn is_attempt_scoped(&self) -> bool {
        matches!(
            self,
            Error::Transformation { .. }
                | Error::ValidationTool { .. }
                | Error::Workspace { .. }
                | Error::Timeout { .. }
                | Error::Git(_)
        )
    }
}

/// Result type alias for remediation operations.
pub type Result<T> = std::result::Result<T, Error>;
