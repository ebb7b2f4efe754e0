//! Error types for glbdash

use thiserror::Error;

/// Main error type for glbdash operations
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure or non-2xx response from the backend.
    #[error("{message}")]
    Network {
        message: String,
        status: Option<u16>,
    },

    #[error("Only GLB files are allowed. Please select a .glb file.")]
    InvalidFileType { file_name: String },

    #[error("File is too large. Maximum size is {max_mb}MB")]
    FileTooLarge { size: u64, max_mb: f64 },

    /// The asset could not be parsed as a GLB scene.
    #[error("Failed to decode model: {0}")]
    Decode(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Visualization error: {0}")]
    Visualization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a network error without an HTTP status.
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network {
            message: message.into(),
            status: None,
        }
    }

    /// HTTP status attached to a network failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the error came from client-side upload validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidFileType { .. } | Error::FileTooLarge { .. })
    }
}

/// Result type alias for glbdash operations
pub type Result<T> = std::result::Result<T, Error>;
