use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::extractor::ExtractError;
use crate::webhooks::RelayError;

/// JSON error body returned by every API route: `{error, details?}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// Map a failed extraction onto a response. `title` is the route's
    /// generic failure message; the error itself goes into `details`.
    pub fn extraction(title: &str, err: &ExtractError) -> Self {
        match err {
            ExtractError::NoCandidates => Self::not_found("No videos found on the page"),
            ExtractError::NoEligibleVideo { limit_bytes, .. } => Self::not_found(format!(
                "No video under {}MB found",
                limit_bytes / (1024 * 1024)
            )),
            other => Self::internal(title).with_details(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.error,
            details: self.details.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::UnknownWebhook(name) => {
                Self::not_found(format!("Webhook '{name}' not found in configuration"))
            }
            RelayError::Unreachable { .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Network error - unable to connect to external service",
            )
            .with_details(err.to_string()),
            RelayError::Upstream { status, body, .. } => Self::new(
                StatusCode::BAD_GATEWAY,
                format!("N8N webhook failed: {status}"),
            )
            .with_details(body),
            RelayError::Request { .. } => {
                Self::internal("Failed to process request").with_details(err.to_string())
            }
        }
    }
}
