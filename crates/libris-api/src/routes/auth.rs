//! Authentication extractors and the login route

use axum::{
    Json, Router,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    routing::post,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use libris_auth::{AuthError, Identity, require_admin, token_from_headers};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::LoginResponse;

// ==================== Auth Extractors ====================

/// Extractor for an authenticated caller
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = token_from_headers(&parts.headers);
        let identity = app_state.auth.authorize(token).await?;

        debug!("Authenticated user: {} (admin: {})", identity.name, identity.is_admin);
        Ok(RequireAuth(identity))
    }
}

/// Extractor for an authenticated admin
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(identity) = RequireAuth::from_request_parts(parts, state).await?;
        require_admin(&identity)?;
        Ok(RequireAdmin(identity))
    }
}

/// Allow a caller to act on their own account, or an admin on any
pub fn ensure_self_or_admin(identity: &Identity, user_id: i64) -> Result<(), ApiError> {
    if identity.id == user_id {
        return Ok(());
    }
    require_admin(identity)?;
    Ok(())
}

// ==================== Login ====================

/// Decode `Authorization: Basic base64(user:pass)`
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn record_login(outcome: &'static str) {
    metrics::counter!("libris_logins_total", "outcome" => outcome).increment(1);
}

/// POST /api/v1/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some((username, password)) = basic_credentials(&headers) else {
        record_login("failure");
        return Err(ApiError::LoginRequired);
    };

    match state.auth.issue(&username, &password).await {
        Ok(issued) => {
            record_login("success");
            Ok(Json(LoginResponse {
                token: issued.token,
                expires_in: issued.expires_in,
            }))
        }
        Err(AuthError::NotFound | AuthError::BadCredentials) => {
            record_login("failure");
            Err(ApiError::LoginRequired)
        }
        Err(e) => Err(e.into()),
    }
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}
