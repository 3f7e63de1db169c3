//! Authentication error types

use axum::http::StatusCode;
use libris_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token is missing")]
    MissingToken,

    #[error("Token is invalid")]
    InvalidToken,

    #[error("Could not verify credentials")]
    BadCredentials,

    #[error("User not found")]
    NotFound,

    #[error("Admin privileges required")]
    Forbidden,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::BadCredentials
            | AuthError::NotFound => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::PasswordHash(_) | AuthError::Jwt(_) | AuthError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the client
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Token is missing",
            AuthError::InvalidToken => "Token is invalid",
            // Login failures share one message so names cannot be probed
            AuthError::BadCredentials | AuthError::NotFound => "Could not verify",
            AuthError::Forbidden => "Admin privileges required",
            AuthError::PasswordHash(_) | AuthError::Jwt(_) | AuthError::Database(_) => {
                "Internal error"
            }
        }
    }
}
