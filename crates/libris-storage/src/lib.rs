//! Libris Cover Storage
//!
//! This crate stores book cover images. Covers are written under a
//! generated, collision-free filename which the catalog records as the
//! book's `img_url`.

pub mod backend;
pub mod error;
pub mod local;

pub use backend::{CoverFormat, CoverStorage};
pub use error::StorageError;
pub use local::LocalStorage;
