//! Error types for mbuild.

use thiserror::Error;

use crate::model::SubModel;

#[derive(Error, Debug)]
pub enum MbError {
    #[error("Invalid training inputs: {0}")]
    InvalidInputs(String),

    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    #[error("Training the {model} model failed: {reason}")]
    TrainingFailed { model: SubModel, reason: String },

    #[error("Incomplete build: {0}")]
    IncompleteBuild(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Timed out waiting for build lock: {0}")]
    LockTimeout(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl MbError {
    /// Stable machine-readable code for robot output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInputs(_) => "invalid_inputs",
            Self::CorruptArtifact(_) => "corrupt_artifact",
            Self::TrainingFailed { .. } => "training_failed",
            Self::IncompleteBuild(_) => "incomplete_build",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::ValidationFailed(_) => "validation_failed",
            Self::LockTimeout(_) => "lock_timeout",
            Self::NotFound(_) => "not_found",
        }
    }
}

impl From<serde_json::Error> for MbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MbError>;
