//! Request/Response DTOs

use libris_db::{Book, User};
use serde::{Deserialize, Serialize};

// ==================== Auth Types ====================

/// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
}

// ==================== User Types ====================

/// Registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Update user request
#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<bool>,
}

/// User response (without password)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            is_admin: user.is_admin,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserResponse>,
}

/// The caller's profile together with the books they hold
#[derive(Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub books: Vec<BookResponse>,
}

// ==================== Book Types ====================

/// Update book request
#[derive(Deserialize, Default)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub synopsis: Option<String>,
    pub author: Option<String>,
    pub year_of_publish: Option<i64>,
}

/// Book response
#[derive(Serialize)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub synopsis: String,
    pub author: String,
    pub year_of_publish: i64,
    pub img_url: String,
    /// Path serving the cover image
    pub cover_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            cover_url: format!("/api/v1/books/{}/cover", book.id),
            id: book.id,
            title: book.title,
            synopsis: book.synopsis,
            author: book.author,
            year_of_publish: book.year_of_publish,
            img_url: book.img_url,
            created_at: book.created_at.to_rfc3339(),
            updated_at: book.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct BookEnvelope {
    pub book: BookResponse,
}

#[derive(Serialize)]
pub struct BooksResponse {
    pub books: Vec<BookResponse>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub total: i64,
}

impl BooksResponse {
    pub fn from_books(books: Vec<Book>) -> Self {
        Self {
            books: books.into_iter().map(BookResponse::from).collect(),
        }
    }
}
