//! Libris Database Layer
//!
//! This crate provides the persistence layer for Libris: users (the
//! credential store), books, and the borrow association between them,
//! stored in SQLite via sqlx.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::Database;
