// src/error.rs

//! Crate-wide error type
//!
//! One enum covers every failure class the engine can report. Variants map
//! onto phases: validation and dependency errors surface before any
//! filesystem mutation, pipeline errors wrap a failing operation with run
//! context, and budget errors can accompany an otherwise successful
//! operation (partial backup).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, validating, or executing a pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// A single operation's preconditions are not met
    #[error("validation failed for {action} '{operation_id}': {reason}")]
    Validation {
        operation_id: String,
        action: String,
        reason: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// An operation references dependency ids not present in the pipeline
    #[error("operation '{operation_id}' references missing dependencies: {missing:?}")]
    Dependency {
        operation_id: String,
        missing: Vec<String>,
    },

    /// The dependency graph contains a cycle
    #[error("dependency cycle involving operations: {ids:?}")]
    DependencyCycle { ids: Vec<String> },

    /// An operation declares a conflict with another operation in the pipeline
    #[error("operation '{operation_id}' conflicts with '{with}'")]
    Conflict { operation_id: String, with: String },

    /// A failing operation wrapped with pipeline-level context
    ///
    /// `failed_index` is 1-based to match the way runs are reported.
    #[error("operation {failed_index}/{total} failed: {source}")]
    Pipeline {
        failed_index: usize,
        total: usize,
        succeeded: Vec<String>,
        #[source]
        source: Box<Error>,
    },

    /// An error from a direct single-operation run
    #[error("{action} '{operation_id}' failed: {source}")]
    Operation {
        action: String,
        operation_id: String,
        #[source]
        source: Box<Error>,
    },

    /// Requested backup bytes would exceed the remaining budget
    #[error("backup budget exceeded: requested {requested_mb:.3} MB, remaining {remaining_mb:.3} MB")]
    BudgetExceeded {
        requested_mb: f64,
        remaining_mb: f64,
    },

    /// A path resolves outside the sandbox root
    #[error("path escapes filesystem root: {0}")]
    PathEscape(String),

    /// Malformed or empty path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A filesystem entry that was expected to exist does not
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A filesystem entry exists where none may
    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// The path exists but has the wrong kind for the requested call
    #[error("{path}: {reason}", path = .path.display())]
    WrongKind { path: PathBuf, reason: String },

    /// Stored checksum does not match current content
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}", path = .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Archive encode/decode failure
    #[error("archive error: {0}")]
    Archive(String),

    /// Cancellation was requested before or during the named step
    #[error("operation cancelled during {0}")]
    Cancelled(String),

    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Plan document (de)serialization failure
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Build a validation error without an underlying cause
    pub fn validation(
        operation_id: impl Into<String>,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            operation_id: operation_id.into(),
            action: action.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Wrap an error with single-operation run context
    pub fn operation(
        action: impl Into<String>,
        operation_id: impl Into<String>,
        source: Error,
    ) -> Self {
        Self::Operation {
            action: action.into(),
            operation_id: operation_id.into(),
            source: Box::new(source),
        }
    }

    /// True for errors raised by precondition checks rather than I/O
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Dependency { .. }
                | Self::DependencyCycle { .. }
                | Self::Conflict { .. }
                | Self::PathEscape(_)
                | Self::InvalidPath(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_helper() {
        let err = Error::validation("op-1", "create_file", "path already exists");
        assert!(err.is_validation());
        let msg = err.to_string();
        assert!(msg.contains("op-1"));
        assert!(msg.contains("create_file"));
    }

    #[test]
    fn test_pipeline_error_reports_index() {
        let inner = Error::validation("op-3", "create_directory", "file in the way");
        let err = Error::Pipeline {
            failed_index: 3,
            total: 3,
            succeeded: vec!["op-1".into(), "op-2".into()],
            source: Box::new(inner),
        };
        assert!(err.to_string().contains("operation 3/3"));
    }

    #[test]
    fn test_budget_exceeded_formats_sizes() {
        let err = Error::BudgetExceeded {
            requested_mb: 2.5,
            remaining_mb: 1.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("2.500"));
        assert!(msg.contains("1.000"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(!err.is_validation());
        assert!(matches!(err, Error::Io(_)));
    }
}
