//! API error types and response formatting.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A board operation failed.
    #[error(transparent)]
    Board(#[from] sheetboard_core::Error),

    /// The request body could not be read as the expected JSON.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        use sheetboard_core::Error;

        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Board(err) => match err {
                Error::Auth => StatusCode::UNAUTHORIZED,
                Error::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Validation(_) | Error::Format(_) => StatusCode::BAD_REQUEST,
                Error::Upstream(_) => StatusCode::BAD_GATEWAY,
                Error::Storage(_) | Error::Database(_) | Error::CorruptRow { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Board(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, code = self.code(), "internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: self.code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
