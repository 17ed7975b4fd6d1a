//! API Error Responses

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bundle_store::PredictError;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Predict(#[from] PredictError),
    /// Body was not JSON or did not match the request shape
    #[error("Invalid request body: {}", .0.body_text())]
    InvalidRequest(#[from] JsonRejection),
    #[error("Loaded bundle is a {model}, which does not support {operation}")]
    UnsupportedOperation {
        model: &'static str,
        operation: &'static str,
    },
    #[error("Metrics exporter is not installed")]
    MetricsUnavailable,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Predict(e) => e.kind(),
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::UnsupportedOperation { .. } => "unsupported_operation",
            ApiError::MetricsUnavailable => "metrics_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Predict(e) if e.is_caller_error() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Predict(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidRequest(rejection) => rejection.status(),
            ApiError::UnsupportedOperation { .. } => StatusCode::BAD_REQUEST,
            ApiError::MetricsUnavailable => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed ({}): {}", self.kind(), self);
        }

        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
