//! Error types for template synthesis.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors that can occur while rendering or writing a template.
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Unsupported template format: {0}")]
    UnsupportedFormat(String),

    #[error("Output path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
