//! API error types

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use libris_auth::AuthError;
use libris_core::CoreError;
use libris_db::DbError;
use libris_storage::StorageError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Login failed; answered with a Basic challenge
    #[error("Could not verify")]
    LoginRequired,

    #[error("Forbidden")]
    Forbidden,

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn db_status(e: &DbError) -> (StatusCode, String) {
    match e {
        DbError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("{} not found", msg)),
        DbError::Duplicate(msg) => (StatusCode::CONFLICT, msg.clone()),
        DbError::Connection(_) => internal(e),
    }
}

fn storage_status(e: &StorageError) -> (StatusCode, String) {
    match e {
        StorageError::NotFound(_) => (StatusCode::NOT_FOUND, "Cover not found".to_string()),
        StorageError::Io(_) | StorageError::InvalidName(_) => internal(e),
    }
}

fn internal(e: &dyn std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::LoginRequired => (StatusCode::UNAUTHORIZED, "Could not verify".to_string()),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Admin privileges required".to_string(),
            ),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Payload too large".to_string(),
            ),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
            ),
            ApiError::Internal(msg) => internal(msg),
            ApiError::Core(e) => match e {
                CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
                CoreError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                CoreError::Database(e) => db_status(e),
                CoreError::Storage(e) => storage_status(e),
            },
            ApiError::Database(e) => db_status(e),
            ApiError::Storage(e) => storage_status(e),
            ApiError::Auth(e) => {
                let status = e.status();
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    internal(e)
                } else {
                    (status, e.public_message().to_string())
                }
            }
        };

        let body = axum::Json(json!({
            "error": message
        }));

        if matches!(self, ApiError::LoginRequired) {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"Login required\"")],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}
