//! Token issuing, token verification and the admin role check

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use libris_db::{Database, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::jwt::TokenManager;
use crate::password::verify_password;

/// Header carrying the raw token
pub const TOKEN_HEADER: &str = "x-access-token";

/// A valid argon2 hash that never matches, verified when the user is unknown
/// so login timing does not reveal which names exist
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nX2F0dGFja19wcmV2ZW50aW9u$K8rI5T7VdQ8xkO0GqK5K2w";

/// The authenticated caller, resolved from a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub identity: Identity,
}

/// Issues tokens against the credential store and resolves them back to users
#[derive(Clone)]
pub struct Authenticator {
    db: Database,
    tokens: Arc<TokenManager>,
}

impl Authenticator {
    pub fn new(db: Database, tokens: TokenManager) -> Self {
        Self {
            db,
            tokens: Arc::new(tokens),
        }
    }

    /// Check a username/password pair and sign a token for it
    pub async fn issue(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        debug!("Login attempt for user: {}", username);

        let Some(user) = self.db.get_user_by_name(username).await? else {
            let _ = verify_password(password, DUMMY_HASH)?;
            warn!("Login for unknown user: {}", username);
            return Err(AuthError::NotFound);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!("Bad password for user: {}", username);
            return Err(AuthError::BadCredentials);
        }

        let token = self.tokens.generate_token(user.id, &user.name)?;
        info!("User {} logged in", user.name);

        Ok(IssuedToken {
            token,
            expires_in: self.tokens.ttl_seconds(),
            identity: Identity::from(&user),
        })
    }

    /// Verify a token and resolve the user it was issued to
    ///
    /// The token is bound to the user id and the name it was issued under, so
    /// it stops working once that account is deleted or renamed.
    pub async fn authorize(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;
        let claims = self.tokens.validate_token(token)?;

        let user = self.db.get_user_by_id(claims.sub).await?.ok_or_else(|| {
            warn!("Token for a user that no longer exists: {}", claims.sub);
            AuthError::InvalidToken
        })?;

        if user.name != claims.name {
            warn!(
                "Token for {} presented after rename to {}",
                claims.name, user.name
            );
            return Err(AuthError::InvalidToken);
        }

        Ok(Identity::from(&user))
    }
}

/// Fail with `Forbidden` unless the caller is an admin
pub fn require_admin(identity: &Identity) -> Result<(), AuthError> {
    if identity.is_admin {
        Ok(())
    } else {
        warn!("User {} attempted an admin action", identity.name);
        Err(AuthError::Forbidden)
    }
}

/// Pull the raw token out of `x-access-token` or `Authorization: Bearer`
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|h| h.to_str().ok()) {
        return Some(token.trim());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}
