//! Book catalog routes

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use libris_core::{BookDraft, CoverUpload};
use libris_db::UpdateBook;
use std::collections::HashMap;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

use super::auth::RequireAdmin;
use super::extract::{ApiJson, ApiPath};
use super::types::{BookEnvelope, BooksResponse, CountResponse, UpdateBookRequest, UsersResponse};

// ==================== Multipart Form ====================

/// Text fields and the optional `image` part of a book upload
#[derive(Default)]
struct BookForm {
    fields: HashMap<String, String>,
    cover: Option<CoverUpload>,
}

impl BookForm {
    async fn read(
        multipart: Result<Multipart, MultipartRejection>,
        max_image_bytes: usize,
    ) -> Result<Self, ApiError> {
        let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let mut form = BookForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                if data.len() > max_image_bytes {
                    return Err(ApiError::PayloadTooLarge);
                }
                form.cover = Some(CoverUpload { filename, data });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    fn take(&mut self, key: &str) -> Result<String, ApiError> {
        self.fields
            .remove(key)
            .ok_or_else(|| ApiError::BadRequest(format!("Missing field: {}", key)))
    }

    fn take_cover(&mut self) -> Result<CoverUpload, ApiError> {
        self.cover
            .take()
            .ok_or_else(|| ApiError::BadRequest("Missing field: image".to_string()))
    }
}

// ==================== Book Routes ====================

/// GET /api/v1/books
async fn list_books(State(state): State<AppState>) -> Result<Json<BooksResponse>, ApiError> {
    let books = state.library.list_books().await?;
    Ok(Json(BooksResponse::from_books(books)))
}

/// GET /api/v1/books/count
async fn count_books(State(state): State<AppState>) -> Result<Json<CountResponse>, ApiError> {
    let total = state.library.count_books().await?;
    Ok(Json(CountResponse { total }))
}

/// GET /api/v1/books/{id}
async fn get_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<BookEnvelope>, ApiError> {
    let book = state.library.get_book(id).await?;
    Ok(Json(BookEnvelope { book: book.into() }))
}

/// GET /api/v1/books/{id}/cover
async fn get_cover(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, ApiError> {
    let (data, name) = state.library.read_cover(id).await?;
    let mime = mime_guess::from_path(&name).first_or_octet_stream();

    Ok(([(header::CONTENT_TYPE, mime.to_string())], data).into_response())
}

/// POST /api/v1/books (Admin only)
async fn create_book(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<BookEnvelope>), ApiError> {
    let mut form = BookForm::read(multipart, state.max_upload_bytes).await?;

    let year_of_publish = form
        .take("year_of_publish")?
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest("year_of_publish must be an integer".to_string()))?;
    let draft = BookDraft {
        title: form.take("title")?,
        synopsis: form.take("synopsis")?,
        author: form.take("author")?,
        year_of_publish,
    };
    let cover = form.take_cover()?;

    debug!("Creating book: {}", draft.title);
    let book = state.library.add_book(draft, cover).await?;

    Ok((StatusCode::CREATED, Json(BookEnvelope { book: book.into() })))
}

/// PUT /api/v1/books/{id} (Admin only)
async fn update_book(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateBookRequest>,
) -> Result<Json<BookEnvelope>, ApiError> {
    let book = state
        .library
        .update_book(
            id,
            UpdateBook {
                title: request.title,
                synopsis: request.synopsis,
                author: request.author,
                year_of_publish: request.year_of_publish,
            },
        )
        .await?;

    Ok(Json(BookEnvelope { book: book.into() }))
}

/// PUT /api/v1/books/{id}/cover (Admin only)
async fn replace_cover(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BookEnvelope>, ApiError> {
    let mut form = BookForm::read(multipart, state.max_upload_bytes).await?;
    let book = state.library.replace_cover(id, form.take_cover()?).await?;

    Ok(Json(BookEnvelope { book: book.into() }))
}

/// DELETE /api/v1/books/{id} (Admin only)
async fn delete_book(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.library.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/books/{id}/borrowers (Admin only)
async fn list_borrowers(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.library.borrowers(id).await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

/// Create book routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/count", get(count_books))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/books/{id}/cover", get(get_cover).put(replace_cover))
        .route("/books/{id}/borrowers", get(list_borrowers))
}
