//! Error types for Factorec
//!
//! Every failure past the interaction fetch boundary surfaces as one of
//! these variants with a human-readable message. Fetch failures are not
//! errors; they are reported as a typed fetch outcome by the engine.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::io;
use thiserror::Error;

/// Factorec error types
#[derive(Debug, Error)]
pub enum FactorecError {
    /// Interaction data could not be obtained from the provider
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Input records are empty or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rating matrix is too degenerate to factorize
    #[error("Training error: {0}")]
    Training(String),

    /// No trained artifact exists yet
    #[error("Model not trained: {0}")]
    NotTrained(String),

    /// User is absent from the active artifact
    #[error("Unknown user: {0}")]
    UnknownUser(i64),

    /// Memory or size limits were hit during training
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Durable artifact storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Persisted artifact was written by an incompatible engine version
    #[error("Incompatible artifact: {0}")]
    IncompatibleArtifact(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad request error
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FactorecError {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            FactorecError::DataUnavailable(_) => "data_unavailable",
            FactorecError::Validation(_) => "validation_error",
            FactorecError::Training(_) => "training_error",
            FactorecError::NotTrained(_) => "not_trained",
            FactorecError::UnknownUser(_) => "unknown_user",
            FactorecError::ResourceExhausted(_) => "resource_exhausted",
            FactorecError::Storage(_) => "storage_error",
            FactorecError::IncompatibleArtifact(_) => "incompatible_artifact",
            FactorecError::Config(_) => "config_error",
            FactorecError::BadRequest(_) => "bad_request",
            FactorecError::Io(_) => "io_error",
            FactorecError::Serialization(_) => "serialization_error",
            FactorecError::Internal(_) => "internal_error",
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        match self {
            FactorecError::Validation(_)
            | FactorecError::NotTrained(_)
            | FactorecError::UnknownUser(_)
            | FactorecError::BadRequest(_) => tracing::warn!("⚠️ {}", self),
            _ => tracing::error!("❌ {}", self),
        }
    }
}

/// Result type for Factorec operations
pub type Result<T> = std::result::Result<T, FactorecError>;

impl From<serde_json::Error> for FactorecError {
    fn from(err: serde_json::Error) -> Self {
        FactorecError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for FactorecError {
    fn from(err: tokio::task::JoinError) -> Self {
        FactorecError::Internal(format!("Background task failed: {}", err))
    }
}
