//! Libris Core Business Logic
//!
//! This crate provides the catalog and circulation logic of Libris:
//! adding, updating and removing books together with their stored covers,
//! and borrowing and returning books.

pub mod error;
pub mod library;
pub mod validate;

pub use error::CoreError;
pub use library::{BookDraft, CoverUpload, LibraryService};
pub use validate::{validate_book_fields, validate_email, validate_password, validate_username};
