//! Libris Authentication and Authorization
//!
//! This crate issues and verifies the signed access tokens used by the
//! Libris API, hashes passwords, and implements the admin role check.

pub mod error;
pub mod guard;
pub mod jwt;
pub mod password;

pub use error::AuthError;
pub use guard::{Authenticator, Identity, IssuedToken, require_admin, token_from_headers};
pub use jwt::{Claims, TokenManager};
pub use password::{hash_password, verify_password};
