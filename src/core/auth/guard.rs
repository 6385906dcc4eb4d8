//! Verified-request context
//!
//! The `AuthUser` extractor is the authorization gate the rest of the API
//! (event routes and friends) consumes: it verifies the Bearer access token
//! and exposes the proven identity. This is the pure JWT path; nothing here
//! touches the database or the refresh machinery.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use uuid::Uuid;

use crate::core::auth::jwt::JwtService;
use crate::core::auth::service::AuthError;

/// Identity proven by a verified access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let codec = JwtService::from_ref(state);

        // Expiry and forgery reject differently so clients can distinguish
        // "refresh and retry" from "force re-login"
        let claims = codec.verify_access_token(&token)?;
        let user_id = claims.user_id()?;

        Ok(AuthUser {
            user_id,
            name: claims.name,
        })
    }
}

/// Extract the Bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Unauthorized)?;

    if token.is_empty() {
        return Err(AuthError::Unauthorized);
    }

    Ok(token.to_string())
}
