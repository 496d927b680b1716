//! Error types for the AI Core module

use thiserror::Error;

/// Errors that can occur in the AI Core module
#[derive(Error, Debug)]
pub enum AiCoreError {
    /// Model validation failed
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    /// Preprocessor used before it was fitted
    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    /// Input width does not match the fitted width
    #[error("Dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid model parameters
    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for AI Core operations
pub type Result<T> = std::result::Result<T, AiCoreError>;
