//! Application error type and its HTTP translation.
//!
//! Every handler returns `Result<_, AppError>`; the conversion to a status
//! code and a `{ success, message }` body happens here and nowhere else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// A unique key (email, slug) is already taken.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Login against an email that has no account.
    #[error("You are not registered user")]
    NotRegistered,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// An external service (LLM) answered with an error.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("{0}")]
    Unavailable(String),
}

/// JSON body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotRegistered => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidCredentials(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message shown to the client. Server-side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Storage(_) | AppError::Hashing(_) => "Something went wrong".to_string(),
            AppError::Upstream(_) => "Summary service failed".to_string(),
            AppError::InvalidToken(reason) => format!("Token failed: {}", reason),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }

        let body = ErrorResponse {
            success: false,
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}
