//! # API Error Types
//!
//! The only place errors become HTTP responses. Validation problems map to
//! 400, missing server files to 404, engine failures to 500 with their
//! message, and storage failures to 500 with the detail logged but hidden.
//!
//! Every error body has the same shape: `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use stp_core::ValidationError;
use thiserror::Error;
use utoipa::ToSchema;

use crate::orchestration::OrchestratorError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// The request was malformed or failed validation (400).
    #[error("{0}")]
    BadRequest(String),

    /// A referenced server file does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// The geometry engine failed on this input (500, message returned).
    #[error("{0}")]
    Generation(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Generation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Generation(_) => tracing::warn!(error = %self, "artifact generation failed"),
            _ => {}
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(e) => e.into(),
            OrchestratorError::NotFound(_) => Self::NotFound(err.to_string()),
            OrchestratorError::Generation { .. } => Self::Generation(err.to_string()),
            OrchestratorError::Storage(_) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use stp_cache::CacheError;
    use stp_core::ArtifactKind;
    use stp_engine::EngineError;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Generation("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let err = AppError::from(ValidationError::UnsupportedExtension(".txt".into()));
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(
            err.to_string(),
            "Unsupported file type: .txt, expected .stp or .step"
        );
    }

    #[tokio::test]
    async fn not_found_body_names_path() {
        let err = AppError::from(OrchestratorError::NotFound(PathBuf::from("/data/missing.step")));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "File not found: /data/missing.step");
    }

    #[tokio::test]
    async fn generation_message_is_returned() {
        let err = AppError::from(OrchestratorError::Generation {
            kind: ArtifactKind::Mesh,
            source: EngineError::Failed("bad B-spline surface".into()),
        });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to convert: bad B-spline surface");
    }

    #[tokio::test]
    async fn storage_detail_is_hidden() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full at /srv/cache");
        let err = AppError::from(OrchestratorError::Storage(CacheError::Io(io)));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
        assert!(!body.to_string().contains("disk full"));
    }
}
