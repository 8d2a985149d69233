//! API error type and its JSON envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use remit_rates::RatesError;

/// All errors that a request handler can surface.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// No browser session could be started for any provider.
    #[error("Scraping unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the request path for the error envelope.
    pub fn at(self, path: &str) -> PathError {
        PathError {
            error: self,
            path: path.to_string(),
        }
    }
}

impl From<RatesError> for ApiError {
    fn from(e: RatesError) -> Self {
        match e {
            RatesError::Systemic(detail) => ApiError::Unavailable(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// An [`ApiError`] tied to the request path it occurred on.
#[derive(Debug)]
pub struct PathError {
    pub error: ApiError,
    pub path: String,
}

impl IntoResponse for PathError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        if status.is_server_error() {
            tracing::error!(path = %self.path, status = status.as_u16(), "{}", self.error);
        } else {
            tracing::debug!(path = %self.path, status = status.as_u16(), "{}", self.error);
        }
        (
            status,
            Json(serde_json::json!({
                "status": super::Status::Error,
                "message": self.error.to_string(),
                "path": self.path,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, PathError>;
