//! Libris REST API
//!
//! This crate provides the Axum-based HTTP API for Libris: login, the
//! book catalog with cover images, user accounts and borrowing.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, normalize_paths};
pub use state::{AppState, MetricsHandle};
