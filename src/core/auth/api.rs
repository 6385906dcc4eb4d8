//! Auth API endpoints
//!
//! - POST /api/auth/register - Create an account (no session established)
//! - POST /api/auth/login - Issue an access token + refresh cookie
//! - POST /api/auth/refresh-token - Rotate the refresh token
//! - POST /api/auth/logout - Revoke the refresh token, clear the cookie
//! - GET  /api/auth/me - Current user from the access token
//! - GET  /api/auth/csrf-token - Issue/reuse the CSRF secret, return token
//! - POST /api/auth/forgot-password - Start a password reset
//! - POST /api/auth/reset-password/{token} - Consume a reset link
//!
//! Every unsafe method on this router passes the CSRF guard first. The
//! refresh token travels only in an HTTP-only cookie; the access token only
//! in response bodies.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, FromRef, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::csrf;
use crate::core::auth::guard::AuthUser;
use crate::core::auth::jwt::JwtService;
use crate::core::auth::rate_limit::LoginRateLimiter;
use crate::core::auth::service::{AuthError, AuthService, LoginRequest, RegisterRequest};
use crate::core::db::models::UserResponse;

/// Cookie carrying the refresh token between refresh calls
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Refresh cookie lifetime, aligned with the refresh token's 7-day expiry
const REFRESH_COOKIE_MAX_AGE_DAYS: i64 = 7;

/// Auth API state
pub struct AuthApiState {
    pub auth_service: AuthService,
    pub login_limiter: LoginRateLimiter,
}

impl FromRef<Arc<AuthApiState>> for JwtService {
    fn from_ref(state: &Arc<AuthApiState>) -> Self {
        state.auth_service.codec().clone()
    }
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Map domain failures to HTTP status/code pairs. This is the only place
/// that decides response shapes for auth errors.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::InvalidCredentials => (StatusCode::BAD_REQUEST, "INVALID_CREDENTIALS"),
            AuthError::DuplicateEmail => (StatusCode::BAD_REQUEST, "DUPLICATE_EMAIL"),
            AuthError::WeakPassword(_) => (StatusCode::BAD_REQUEST, "WEAK_PASSWORD"),
            AuthError::InvalidResetToken => (StatusCode::BAD_REQUEST, "INVALID_RESET_TOKEN"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AuthError::MissingRefreshToken => (StatusCode::UNAUTHORIZED, "REFRESH_TOKEN_MISSING"),
            AuthError::RefreshExpired => (StatusCode::UNAUTHORIZED, "REFRESH_TOKEN_EXPIRED"),
            AuthError::InvalidRefreshToken => (StatusCode::FORBIDDEN, "INVALID_REFRESH_TOKEN"),
            AuthError::RefreshTokenRevoked => (StatusCode::FORBIDDEN, "INVALID_TOKEN_DB"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            AuthError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            AuthError::Internal(detail) => {
                tracing::error!("internal auth error: {detail}");
                let body = ApiError::new("Internal server error", "INTERNAL_ERROR");
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
            }
        };

        let body = ApiError::new(self.to_string(), code);
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Create the auth API router. The CSRF layer guards every unsafe method
/// registered here; safe methods pass through untouched.
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/refresh-token", post(refresh_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/api/auth/csrf-token", get(csrf_token_handler))
        .route("/api/auth/forgot-password", post(forgot_password_handler))
        .route("/api/auth/reset-password/{token}", post(reset_password_handler))
        .layer(middleware::from_fn(csrf::validate_request))
        .with_state(state)
}

/// POST /api/auth/register
async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    tracing::info!("registration attempt for {}", request.email);

    state.auth_service.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// POST /api/auth/login
///
/// Rate limited per client key before credentials are even looked at, so the
/// 429 is returned regardless of credential correctness.
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    let key = client_key(&headers, addr);
    if !state.login_limiter.check(&key) {
        tracing::warn!("login rate limit hit for {key}");
        return Err(AuthError::RateLimited);
    }

    let outcome = state.auth_service.login(request).await?;

    let jar = jar.add(refresh_cookie(outcome.refresh_token));
    Ok((
        jar,
        Json(LoginResponse {
            access_token: outcome.access_token,
            user: outcome.user,
        }),
    ))
}

/// POST /api/auth/refresh-token
///
/// Any failure clears the refresh cookie: the client falls back to a full
/// re-login rather than replaying a dead token forever.
async fn refresh_handler(State(state): State<Arc<AuthApiState>>, jar: CookieJar) -> Response {
    let Some(cookie) = jar.get(REFRESH_COOKIE_NAME) else {
        return AuthError::MissingRefreshToken.into_response();
    };
    let raw_token = cookie.value().to_string();

    match state.auth_service.refresh(&raw_token).await {
        Ok(outcome) => {
            let jar = jar.add(refresh_cookie(outcome.refresh_token));
            (
                jar,
                Json(RefreshResponse {
                    access_token: outcome.access_token,
                    user_id: outcome.user_id,
                }),
            )
                .into_response()
        }
        Err(err) => (clear_refresh_cookie(jar), err).into_response(),
    }
}

/// POST /api/auth/logout
///
/// Idempotent: no cookie means already logged out, and deletion failures are
/// logged rather than trapping the user in a session they cannot leave.
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let raw_token = jar.get(REFRESH_COOKIE_NAME).map(|c| c.value().to_string());

    state.auth_service.logout(raw_token.as_deref()).await;

    (
        clear_refresh_cookie(jar),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// GET /api/auth/me
async fn me_handler(
    State(state): State<Arc<AuthApiState>>,
    user: AuthUser,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.auth_service.me(user.user_id).await?;
    Ok(Json(user))
}

/// GET /api/auth/csrf-token
///
/// Issues the secret cookie when absent and always returns the derived
/// token; repeated calls within the cookie's lifetime yield the same token.
async fn csrf_token_handler(jar: CookieJar) -> (CookieJar, Json<CsrfTokenResponse>) {
    let (jar, token) = csrf::ensure_secret(jar);
    (jar, Json(CsrfTokenResponse { csrf_token: token }))
}

/// POST /api/auth/forgot-password
async fn forgot_password_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth_service.forgot_password(&request.email).await?;

    Ok(Json(MessageResponse::new("Password reset email sent")))
}

/// POST /api/auth/reset-password/{token}
async fn reset_password_handler(
    State(state): State<Arc<AuthApiState>>,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .auth_service
        .reset_password(&token, &request.password)
        .await?;

    Ok(Json(MessageResponse::new("Password reset successful")))
}

/// Build the refresh cookie: HTTP-only and cross-site capable, 7-day expiry.
/// Both flags are load-bearing in a cross-origin deployment; a non-`None`
/// SameSite here silently breaks refresh in the browser.
fn refresh_cookie(token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .max_age(time::Duration::days(REFRESH_COOKIE_MAX_AGE_DAYS))
        .build()
}

fn clear_refresh_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((REFRESH_COOKIE_NAME, "")).path("/").build())
}

/// Rate-limit key for a client: the first forwarded address when running
/// behind a proxy, the peer address otherwise.
fn client_key(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}
