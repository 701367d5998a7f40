//! HTTP error mapping
//!
//! Every handler failure is rendered as `{"error": <kind>, "details": <message>}`
//! with a status code derived from the underlying [`FactorecError`].
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use factorec_common::FactorecError;

/// Error returned by API handlers
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub FactorecError);

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind
    pub error: String,

    /// Human-readable message
    pub details: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(FactorecError::BadRequest(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            FactorecError::Validation(_) | FactorecError::BadRequest(_) => StatusCode::BAD_REQUEST,
            FactorecError::NotTrained(_) | FactorecError::UnknownUser(_) => StatusCode::NOT_FOUND,
            FactorecError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            FactorecError::Training(_)
            | FactorecError::ResourceExhausted(_)
            | FactorecError::Storage(_)
            | FactorecError::IncompatibleArtifact(_)
            | FactorecError::Config(_)
            | FactorecError::Io(_)
            | FactorecError::Serialization(_)
            | FactorecError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.0.kind().to_string(),
            details: err.0.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.log();
        let status = self.status_code();
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
