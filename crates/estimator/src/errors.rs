//! Estimation engine error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ModelKind;

/// Estimation engine errors
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Missing required fields: {}", .fields.join(", "))]
    MissingField { fields: Vec<String> },

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("The {model} model is not trained")]
    NotTrained { model: ModelKind },

    #[error("area_hectares must be greater than zero, got {area}")]
    InvalidArea { area: f64 },

    #[error("Corrupt model artifact: {0}")]
    CorruptArtifact(String),

    #[error("Training the {model} model failed: {cause}")]
    TrainingFailure { model: ModelKind, cause: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Machine-readable error category carried in error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingField,
    InvalidField,
    NotTrained,
    InvalidArea,
    CorruptArtifact,
    TrainingFailure,
    Io,
    Serialization,
    Config,
}

impl EstimationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EstimationError::MissingField { .. } => ErrorKind::MissingField,
            EstimationError::InvalidField { .. } => ErrorKind::InvalidField,
            EstimationError::NotTrained { .. } => ErrorKind::NotTrained,
            EstimationError::InvalidArea { .. } => ErrorKind::InvalidArea,
            EstimationError::CorruptArtifact(_) => ErrorKind::CorruptArtifact,
            EstimationError::TrainingFailure { .. } => ErrorKind::TrainingFailure,
            EstimationError::Io(_) => ErrorKind::Io,
            EstimationError::Serialization(_) => ErrorKind::Serialization,
            EstimationError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EstimationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message_lists_names() {
        let err = EstimationError::MissingField {
            fields: vec!["dbh".into(), "species".into()],
        };
        assert_eq!(err.to_string(), "Missing required fields: dbh, species");
        assert_eq!(err.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::CorruptArtifact).unwrap();
        assert_eq!(json, "\"corrupt_artifact\"");
    }

    #[test]
    fn not_trained_names_the_model() {
        let err = EstimationError::NotTrained {
            model: ModelKind::Sequestration,
        };
        assert_eq!(err.to_string(), "The sequestration model is not trained");
    }
}
