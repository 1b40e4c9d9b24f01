use std::path::PathBuf;
use thiserror::Error;

/// Result type for dicomorg operations
pub type Result<T> = std::result::Result<T, OrganizerError>;

/// Error types for dicomorg operations
#[derive(Error, Debug)]
pub enum OrganizerError {
    /// Invalid setup detected before any file is touched
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A file could not be parsed as DICOM
    #[error("Cannot decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// An anonymized file could not be written
    #[error("Cannot write {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    /// A caller-supplied filter predicate failed on a record
    #[error("Filter predicate failed on {}: {message}", path.display())]
    Predicate { path: PathBuf, message: String },

    /// The worker pool could not be started
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrganizerError {
    /// Errors raised by bad setup rather than by data
    pub fn is_configuration(&self) -> bool {
        matches!(self, OrganizerError::Configuration(_))
    }

    /// Per-file errors that a batch skips over instead of aborting
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OrganizerError::Decode { .. } | OrganizerError::Encode { .. } | OrganizerError::IoError(_)
        )
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        OrganizerError::Configuration(message.into())
    }
}

impl From<rayon::ThreadPoolBuildError> for OrganizerError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        OrganizerError::WorkerPool(format!("{}", e))
    }
}
