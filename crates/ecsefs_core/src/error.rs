//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while assembling a resource graph.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Duplicate resource logical id: {0}")]
    DuplicateResource(String),

    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    #[error("Duplicate output: {0}")]
    DuplicateOutput(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Dangling reference from {from} to {target}")]
    DanglingReference { from: String, target: String },

    #[error("Invalid property {property} on {resource}: {message}")]
    InvalidProperty {
        resource: String,
        property: String,
        message: String,
    },

    #[error("Spec error: {0}")]
    Spec(#[from] ecsefs_spec::SpecError),
}
