//! User account and borrowing routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use libris_auth::hash_password;
use libris_core::{validate_email, validate_password, validate_username};
use libris_db::{NewUser, UpdateUser};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::auth::{RequireAdmin, RequireAuth, ensure_self_or_admin};
use super::extract::{ApiJson, ApiPath};
use super::types::{
    BookEnvelope, BooksResponse, ProfileResponse, RegisterRequest, UpdateUserRequest,
    UserEnvelope, UsersResponse,
};

// ==================== User Routes ====================

/// POST /api/v1/users
async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    validate_username(&request.name)?;
    validate_email(&request.email)?;
    validate_password(&request.password)?;

    debug!("Registering user: {}", request.name);

    let password_hash = hash_password(&request.password)?;
    let user = state
        .db
        .insert_user(NewUser {
            name: request.name,
            email: request.email,
            password_hash,
            is_admin: false,
        })
        .await?;

    info!("Registered user: {}", user.name);

    Ok((StatusCode::CREATED, Json(UserEnvelope { user: user.into() })))
}

/// GET /api/v1/users (Admin only)
async fn list_users(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.db.list_users().await?;

    Ok(Json(UsersResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

/// GET /api/v1/users/{id} (self or admin)
async fn get_user(
    RequireAuth(identity): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<UserEnvelope>, ApiError> {
    ensure_self_or_admin(&identity, id)?;

    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;

    Ok(Json(UserEnvelope { user: user.into() }))
}

/// PUT /api/v1/users/{id} (self or admin; `is_admin` admin only)
async fn update_user(
    RequireAuth(identity): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    ensure_self_or_admin(&identity, id)?;
    if request.is_admin.is_some() && !identity.is_admin {
        return Err(ApiError::Forbidden);
    }

    if let Some(name) = &request.name {
        validate_username(name)?;
    }
    if let Some(email) = &request.email {
        validate_email(email)?;
    }
    let password_hash = match &request.password {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let update = UpdateUser {
        name: request.name,
        email: request.email,
        password_hash,
        is_admin: request.is_admin,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let user = state
        .db
        .update_user(id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;

    info!("Updated user: {}", user.name);

    Ok(Json(UserEnvelope { user: user.into() }))
}

/// DELETE /api/v1/users/{id} (Admin only)
async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_user(id).await? {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }

    info!("User {} deleted by {}", id, admin.name);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/me
async fn me(
    RequireAuth(identity): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_id(identity.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", identity.id)))?;
    let books = state.library.borrowed_books(identity.id).await?;

    Ok(Json(ProfileResponse {
        user: user.into(),
        books: books.into_iter().map(Into::into).collect(),
    }))
}

// ==================== Borrow Routes ====================

/// GET /api/v1/users/{id}/books (self or admin)
async fn borrowed_books(
    RequireAuth(identity): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<BooksResponse>, ApiError> {
    ensure_self_or_admin(&identity, id)?;

    let books = state.library.borrowed_books(id).await?;
    Ok(Json(BooksResponse::from_books(books)))
}

/// POST /api/v1/users/{id}/books/{book_id} (self or admin)
async fn borrow_book(
    RequireAuth(identity): RequireAuth,
    State(state): State<AppState>,
    ApiPath((id, book_id)): ApiPath<(i64, i64)>,
) -> Result<(StatusCode, Json<BookEnvelope>), ApiError> {
    ensure_self_or_admin(&identity, id)?;

    state.library.borrow(id, book_id).await?;
    let book = state.library.get_book(book_id).await?;

    Ok((StatusCode::CREATED, Json(BookEnvelope { book: book.into() })))
}

/// DELETE /api/v1/users/{id}/books/{book_id} (self or admin)
async fn return_book(
    RequireAuth(identity): RequireAuth,
    State(state): State<AppState>,
    ApiPath((id, book_id)): ApiPath<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    ensure_self_or_admin(&identity, id)?;

    state.library.return_book(id, book_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register).get(list_users))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/books", get(borrowed_books))
        .route(
            "/users/{id}/books/{book_id}",
            post(borrow_book).delete(return_book),
        )
        .route("/me", get(me))
}
