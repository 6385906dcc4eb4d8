//! Authentication service
//!
//! Orchestrates registration, login, refresh-token rotation, logout, identity
//! lookup and password reset, composing the token codec, the refresh token
//! store and the user repository. This is the only layer that decides which
//! failures surface and which are cleaned up best-effort.

use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::auth::jwt::{JwtError, JwtService};
use crate::core::db::models::{Role, User, UserResponse};
use crate::core::db::repositories::{
    RefreshTokenRepository, RefreshTokenRepositoryError, UserRepository, UserRepositoryError,
};
use crate::core::mailer::Mailer;

/// Reset links stay valid for one hour
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Authentication failures, mapped to HTTP status/code pairs at the API layer
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already in use")]
    DuplicateEmail,

    #[error("{0}")]
    WeakPassword(&'static str),

    #[error("User not found")]
    UserNotFound,

    #[error("Access denied: no token provided")]
    Unauthorized,

    #[error("Access token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Access denied: no refresh token")]
    MissingRefreshToken,

    #[error("Refresh token expired")]
    RefreshExpired,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token is no longer recognized")]
    RefreshTokenRevoked,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    #[error("Too many login attempts. Please try again later.")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Mapping for the access-token verification path (`me`, request guard).
/// The refresh path maps codec errors explicitly, because expiry means
/// something different there.
impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::TokenExpired,
            JwtError::InvalidToken => AuthError::InvalidToken,
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AuthError::UserNotFound,
            UserRepositoryError::EmailAlreadyExists => AuthError::DuplicateEmail,
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<RefreshTokenRepositoryError> for AuthError {
    fn from(err: RefreshTokenRepositoryError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Registration request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login: tokens plus the public user record. The refresh token
/// goes into an HTTP-only cookie at the API layer, never into the body.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

/// Successful rotation: a fresh pair and the subject it belongs to
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
}

/// Log-and-swallow for cleanup operations whose failure must never surface
/// (expired-record deletion, logout deletion). Operations whose failure has
/// to propagate use `?` instead of this.
fn log_best_effort<T, E: std::fmt::Display>(result: Result<T, E>, context: &str) {
    if let Err(err) = result {
        tracing::warn!("best-effort {context} failed: {err}");
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    tokens: RefreshTokenRepository,
    codec: JwtService,
    mailer: Mailer,
}

impl AuthService {
    pub fn new(
        users: UserRepository,
        tokens: RefreshTokenRepository,
        codec: JwtService,
        mailer: Mailer,
    ) -> Self {
        Self {
            users,
            tokens,
            codec,
            mailer,
        }
    }

    /// Access to the token codec, for the request guard
    pub fn codec(&self) -> &JwtService {
        &self.codec
    }

    /// Password complexity policy, checked before any database I/O
    pub fn validate_password(password: &str) -> Result<(), AuthError> {
        if password.len() < 8 {
            return Err(AuthError::WeakPassword(
                "Password must be at least 8 characters",
            ));
        }
        if !password.chars().any(|c| c.is_uppercase()) {
            return Err(AuthError::WeakPassword(
                "Password must include an uppercase letter",
            ));
        }
        if !password.chars().any(|c| c.is_lowercase()) {
            return Err(AuthError::WeakPassword(
                "Password must include a lowercase letter",
            ));
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::WeakPassword("Password must include a digit"));
        }
        if !password.chars().any(|c| !c.is_alphanumeric()) {
            return Err(AuthError::WeakPassword(
                "Password must include a special character",
            ));
        }
        Ok(())
    }

    /// Register a new account. No session is established: the client logs in
    /// afterwards.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AuthError> {
        Self::validate_password(&request.password)?;

        let user = self
            .users
            .create(&request.name, &request.email, &request.password)
            .await?;

        tracing::info!("user registered: {}", user.id);
        Ok(user.into())
    }

    /// Authenticate and issue a token pair. Unknown email and wrong password
    /// fail identically, so the endpoint is not a user-existence oracle.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, AuthError> {
        let user = self
            .users
            .authenticate(&request.email, &request.password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let (access_token, _) = self.codec.sign_access_token(user.id, &user.name)?;
        let (refresh_token, _) = self.codec.sign_refresh_token(user.id)?;
        self.tokens.create(user.id, &refresh_token).await?;

        tracing::info!("user logged in: {}", user.id);

        Ok(LoginOutcome {
            access_token,
            refresh_token,
            user: user.into(),
        })
    }

    /// Rotate a refresh token: verify, check the store record, then
    /// delete-old + issue-new. Each token is single use; presenting it twice
    /// is indistinguishable from presenting a stolen token and is rejected.
    pub async fn refresh(&self, raw_token: &str) -> Result<RefreshOutcome, AuthError> {
        let claims = match self.codec.verify_refresh_token(raw_token) {
            Ok(claims) => claims,
            Err(JwtError::Expired) => {
                // The record is useless now; losing this delete only leaves
                // a dead row behind
                log_best_effort(
                    self.tokens.delete_by_token(raw_token).await,
                    "expired refresh record cleanup",
                );
                return Err(AuthError::RefreshExpired);
            }
            Err(err) => {
                tracing::warn!("refresh token rejected: {err}");
                return Err(AuthError::InvalidRefreshToken);
            }
        };
        let user_id = claims.user_id().map_err(|_| AuthError::InvalidRefreshToken)?;

        // A signature-valid token without a record was already rotated or
        // logged out: replay defense.
        let record = self
            .tokens
            .find_by_token(raw_token)
            .await?
            .ok_or(AuthError::RefreshTokenRevoked)?;

        if record.user_id != user_id {
            tracing::warn!("refresh record owner mismatch for user {user_id}");
            self.tokens.delete_by_token(raw_token).await?;
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = match self.users.find_by_id(user_id).await? {
            Some(user) => user,
            None => {
                log_best_effort(
                    self.tokens.delete_by_user_and_token(user_id, raw_token).await,
                    "refresh record cleanup for vanished user",
                );
                return Err(AuthError::UserNotFound);
            }
        };

        // Rotation proper. The delete must propagate: failing to consume the
        // old token here would leave it replayable.
        self.tokens.delete_by_token(raw_token).await?;

        let (access_token, _) = self.codec.sign_access_token(user.id, &user.name)?;
        let (refresh_token, _) = self.codec.sign_refresh_token(user.id)?;
        self.tokens.create(user.id, &refresh_token).await?;

        tracing::debug!("refresh token rotated for user {}", user.id);

        Ok(RefreshOutcome {
            access_token,
            refresh_token,
            user_id: user.id,
        })
    }

    /// Invalidate a session. Always succeeds from the caller's perspective;
    /// a missing cookie means the user is already logged out.
    pub async fn logout(&self, raw_token: Option<&str>) {
        let Some(raw_token) = raw_token else {
            return;
        };
        log_best_effort(
            self.tokens.delete_by_token(raw_token).await,
            "logout record deletion",
        );
    }

    /// Load the public record for a verified subject
    pub async fn me(&self, user_id: Uuid) -> Result<UserResponse, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(user.into())
    }

    /// Load a user and require a role, for route groups that gate on it
    pub async fn authorize(&self, user_id: Uuid, required: Role) -> Result<User, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if required.is_admin() && !user.role.is_admin() {
            return Err(AuthError::Forbidden);
        }

        Ok(user)
    }

    /// Start a password reset: store the digest of a fresh secret with a
    /// one-hour window and hand the raw link to the mailer seam.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let secret = generate_reset_secret();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);

        self.users
            .set_reset_token(user.id, &hash_reset_secret(&secret), expires_at)
            .await?;

        self.mailer.send_password_reset(&user.email, &secret);
        Ok(())
    }

    /// Consume a reset link: digest must match an unexpired window, the new
    /// password must satisfy the policy, and every outstanding session is
    /// revoked so a stolen refresh token dies with the old password.
    pub async fn reset_password(&self, raw_token: &str, password: &str) -> Result<(), AuthError> {
        Self::validate_password(password)?;

        let user = self
            .users
            .find_by_reset_token(&hash_reset_secret(raw_token))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        self.users.reset_password(user.id, password).await?;
        self.tokens.delete_all_for_user(user.id).await?;

        tracing::info!("password reset completed for user {}", user.id);
        Ok(())
    }
}

fn generate_reset_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_reset_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
