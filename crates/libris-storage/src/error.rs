//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cover not found: {0}")]
    NotFound(String),

    #[error("Invalid cover name: {0}")]
    InvalidName(String),
}
