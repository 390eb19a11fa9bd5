//! Error type of the authentication operations
//!
//! Every failure renders as `{"error": "<message>"}`. Login failures for an
//! unknown account and for a wrong password share one body, and storage
//! failures never carry driver text to the caller.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;

use crate::{jwt::TokenError, password::PasswordError};

/// Message shared by every failed login
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Email or username already registered
    #[error("{0}")]
    Conflict(String),

    /// No account for the given identifier
    #[error("account not found")]
    NotFound,

    /// Password did not match
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Refresh token unknown, already rotated or expired
    #[error("session not found")]
    SessionNotFound,

    /// The session's access token did not validate
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Password hashing failed
    #[error("password hashing error: {0}")]
    Password(#[from] PasswordError),

    /// Storage failure, including timeouts
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Anything else that is our fault
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status and caller-facing message
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AuthError::NotFound | AuthError::InvalidCredentials => {
                (StatusCode::BAD_REQUEST, INVALID_CREDENTIALS.to_string())
            }
            AuthError::SessionNotFound => {
                (StatusCode::BAD_REQUEST, "invalid refresh token".to_string())
            }
            AuthError::Token(TokenError::Signing(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
            AuthError::Token(_) => (StatusCode::BAD_REQUEST, "invalid session".to_string()),
            AuthError::Password(_) | AuthError::Database(_) | AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
