//! Error types for the spec module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors that can occur while loading or validating a stack configuration.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Stack configuration not found at path: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported configuration format for {0} (expected .yaml, .yml, .json or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid configuration in file {path}: {message}")]
    InvalidFormat { path: PathBuf, message: String },

    #[error("Stack validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Failed to read services directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}
