//! Error types for hostns

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::Namespace;

/// Hostns error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a path
    #[error("I/O error at {path}: {source}")]
    IoAt {
        /// Path where the I/O error occurred
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A process, namespace directory or field could not be found
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource
        kind: &'static str,
        /// Identifier of the missing resource
        id: String,
    },

    /// Opening or switching into a namespace failed
    #[error("failed to join {namespace} namespace at {path}: {source}")]
    Join {
        /// Namespace kind that failed
        namespace: Namespace,
        /// Namespace file that was used
        path: PathBuf,
        /// Underlying system error
        source: std::io::Error,
    },

    /// Switching back to the original namespace failed
    #[error("failed to restore {namespace} namespace: {source}")]
    Restore {
        /// Namespace kind that could not be restored
        namespace: Namespace,
        /// Underlying system error
        source: nix::Error,
    },

    /// The caller stopped waiting for an operation
    #[error("timeout {operation} after {timeout:?}")]
    Timeout {
        /// What was being waited for
        operation: String,
        /// Configured deadline
        timeout: Duration,
    },

    /// A command ran but failed
    #[error("failed to execute {binary}: {message}")]
    Execution {
        /// Binary that was executed
        binary: String,
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Details including captured output
        message: String,
    },

    /// A unit of work returned an unexpected result shape
    #[error("unexpected result: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected result kind
        expected: &'static str,
        /// Result kind that was returned
        actual: &'static str,
    },

    /// Malformed input data
    #[error("parse error: {message}")]
    Parse {
        /// Error message
        message: String,
    },

    /// Invalid configuration or argument
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// The namespace worker exited without reporting a result
    #[error("namespace worker exited without a result")]
    WorkerLost,

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl Error {
    /// Build an [`Error::IoAt`] for `path`
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a caller-side timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for hostns operations
pub type Result<T> = std::result::Result<T, Error>;
