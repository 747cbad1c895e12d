//! Error types for the scheduler policy compiler.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for policy compiler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a whole compile.
///
/// Problems confined to a single configuration line are not represented here;
/// they are reported and the parse continues.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("can not open file: {}", path.display())]
    ConfigOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scheduler policy: {0}")]
    InvalidPolicy(String),

    #[error("snapshot integrity check failed: {0}")]
    SnapshotIntegrity(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::ConfigOpen { .. } => 10,
            Error::InvalidPolicy(_) => 11,
            Error::SnapshotIntegrity(_) => 12,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failure_names_the_file() {
        let err = Error::ConfigOpen {
            path: PathBuf::from("/nonexistent/sched_config"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.code(), 10);
        assert!(err.to_string().contains("/nonexistent/sched_config"));
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err.code(), 60);
    }
}
