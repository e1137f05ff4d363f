use std::path::PathBuf;
use thiserror::Error;

/// Flight recorder error types
#[derive(Error, Debug, Clone)]
pub enum RecorderError {
    #[error("Storage medium not found at {}", .0.display())]
    StorageUnavailable(PathBuf),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Capture device error: {0}")]
    Capture(String),

    #[error("Video encoder error: {0}")]
    Encoder(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;

impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        RecorderError::Storage(e.to_string())
    }
}
