//! Token codec: signing and verification of access and refresh tokens
//!
//! Access tokens are short-lived (15 minutes), refresh tokens are long-lived
//! (7 days). Each kind is signed with its own secret key, so compromising one
//! signing key does not allow forging the other kind of token.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default access token expiration time (15 minutes)
const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Default refresh token expiration time (7 days)
const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

/// Token codec configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing access tokens
    pub access_secret: String,
    /// Secret key for signing refresh tokens (distinct from the access key)
    pub refresh_secret: String,
    /// Access token expiration in minutes
    pub access_token_expiration_minutes: i64,
    /// Refresh token expiration in days
    pub refresh_token_expiration_days: i64,
    /// Token issuer
    pub issuer: String,
}

impl JwtConfig {
    /// Create a new configuration with default lifetimes
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_token_expiration_minutes: ACCESS_TOKEN_EXPIRATION_MINUTES,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
            issuer: "eventra".to_string(),
        }
    }

    /// Create config from environment variables (`JWT_SECRET`,
    /// `REFRESH_TOKEN_SECRET`, optional `JWT_ISSUER`)
    pub fn from_env() -> Result<Self, JwtError> {
        let access_secret = std::env::var("JWT_SECRET").map_err(|_| JwtError::MissingAccessSecret)?;
        let refresh_secret =
            std::env::var("REFRESH_TOKEN_SECRET").map_err(|_| JwtError::MissingRefreshSecret)?;
        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| "eventra".to_string());

        Ok(Self {
            access_secret,
            refresh_secret,
            access_token_expiration_minutes: ACCESS_TOKEN_EXPIRATION_MINUTES,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
            issuer,
        })
    }

    /// Set access token expiration
    pub fn access_token_expiration(mut self, minutes: i64) -> Self {
        self.access_token_expiration_minutes = minutes;
        self
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// Token codec errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT_SECRET environment variable not set")]
    MissingAccessSecret,

    #[error("REFRESH_TOKEN_SECRET environment variable not set")]
    MissingRefreshSecret,

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Display name of the user
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl AccessClaims {
    /// Get the subject as a UUID
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// Claims carried by a refresh token. Deliberately minimal: the server-side
/// store record plus the subject is all a rotation needs.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl RefreshClaims {
    /// Get the subject as a UUID
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// Stateless token codec. Verification outcome is determined entirely by
/// signature and expiry; no storage lookups happen here.
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl JwtService {
    /// Create a new codec from a configuration
    pub fn new(config: JwtConfig) -> Self {
        let access_encoding = EncodingKey::from_secret(config.access_secret.as_bytes());
        let access_decoding = DecodingKey::from_secret(config.access_secret.as_bytes());
        let refresh_encoding = EncodingKey::from_secret(config.refresh_secret.as_bytes());
        let refresh_decoding = DecodingKey::from_secret(config.refresh_secret.as_bytes());

        Self {
            config,
            access_encoding,
            access_decoding,
            refresh_encoding,
            refresh_decoding,
        }
    }

    /// Create the codec from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        let config = JwtConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Sign an access token for a user, returning the token and its expiry
    pub fn sign_access_token(&self, user_id: Uuid, name: &str) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.config.access_token_expiration_minutes);

        let claims = AccessClaims {
            sub: user_id.to_string(),
            name: name.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, exp.timestamp()))
    }

    /// Sign a refresh token for a user, returning the token and its expiry
    pub fn sign_refresh_token(&self, user_id: Uuid) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::days(self.config.refresh_token_expiration_days);

        let claims = RefreshClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, exp.timestamp()))
    }

    /// Verify an access token. `Expired` means well-formed but past its
    /// window; `InvalidToken` means malformed or forged.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let token_data = decode::<AccessClaims>(token, &self.access_decoding, &self.validation())?;
        Ok(token_data.claims)
    }

    /// Verify a refresh token with the same expiry/forgery split
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let token_data = decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation())?;
        Ok(token_data.claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        // Strict expiration checking, no leeway
        validation.leeway = 0;
        validation
    }

    /// Get the refresh token expiration in days
    pub fn refresh_token_expiration_days(&self) -> i64 {
        self.config.refresh_token_expiration_days
    }

    /// Get the access token expiration in minutes
    pub fn access_token_expiration_minutes(&self) -> i64 {
        self.config.access_token_expiration_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> JwtService {
        let config = JwtConfig::new(
            "access_test_secret_at_least_32_bytes!",
            "refresh_test_secret_at_least_32_byte!",
        );
        JwtService::new(config)
    }

    #[test]
    fn test_config_defaults() {
        let config = JwtConfig::new("a_secret", "r_secret");

        assert_eq!(config.access_secret, "a_secret");
        assert_eq!(config.refresh_secret, "r_secret");
        assert_eq!(
            config.access_token_expiration_minutes,
            ACCESS_TOKEN_EXPIRATION_MINUTES
        );
        assert_eq!(
            config.refresh_token_expiration_days,
            REFRESH_TOKEN_EXPIRATION_DAYS
        );
        assert_eq!(config.issuer, "eventra");
    }

    #[test]
    fn test_config_builder() {
        let config = JwtConfig::new("a", "r")
            .access_token_expiration(30)
            .refresh_token_expiration(14)
            .issuer("my_app");

        assert_eq!(config.access_token_expiration_minutes, 30);
        assert_eq!(config.refresh_token_expiration_days, 14);
        assert_eq!(config.issuer, "my_app");
    }

    #[test]
    fn test_config_from_env_missing_secret() {
        let original = std::env::var("JWT_SECRET").ok();
        // SAFETY: test environment
        unsafe { std::env::remove_var("JWT_SECRET") };

        let result = JwtConfig::from_env();
        assert!(matches!(result, Err(JwtError::MissingAccessSecret)));

        if let Some(val) = original {
            // SAFETY: test environment
            unsafe { std::env::set_var("JWT_SECRET", val) };
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = create_test_service();
        let user_id = Uuid::new_v4();

        let (token, exp) = service.sign_access_token(user_id, "Ada").unwrap();
        assert!(!token.is_empty());
        assert!(exp > Utc::now().timestamp());

        let claims = service.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.name, "Ada");
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let service = create_test_service();
        let user_id = Uuid::new_v4();

        let (token, exp) = service.sign_refresh_token(user_id).unwrap();
        assert!(!token.is_empty());
        assert!(exp > Utc::now().timestamp());

        let claims = service.verify_refresh_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_refresh_token_outlives_access_token() {
        let service = create_test_service();
        let user_id = Uuid::new_v4();

        let (_, access_exp) = service.sign_access_token(user_id, "Ada").unwrap();
        let (_, refresh_exp) = service.sign_refresh_token(user_id).unwrap();

        assert!(refresh_exp > access_exp);
    }

    #[test]
    fn test_key_separation_access_key_cannot_verify_refresh() {
        let service = create_test_service();
        let user_id = Uuid::new_v4();

        let (access_token, _) = service.sign_access_token(user_id, "Ada").unwrap();
        let result = service.verify_refresh_token(&access_token);

        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_key_separation_refresh_key_cannot_verify_access() {
        let service = create_test_service();
        let user_id = Uuid::new_v4();

        let (refresh_token, _) = service.sign_refresh_token(user_id).unwrap();
        let result = service.verify_access_token(&refresh_token);

        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_verify_garbage_token() {
        let service = create_test_service();

        assert!(service.verify_access_token("not.a.token").is_err());
        assert!(service.verify_refresh_token("").is_err());
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let service1 = JwtService::new(JwtConfig::new("secret_one", "refresh_one"));
        let service2 = JwtService::new(JwtConfig::new("secret_two", "refresh_two"));

        let user_id = Uuid::new_v4();
        let (token, _) = service1.sign_access_token(user_id, "Ada").unwrap();

        let result = service2.verify_access_token(&token);
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_verify_token_wrong_issuer() {
        let minter =
            JwtService::new(JwtConfig::new("shared_access", "shared_refresh").issuer("other_app"));
        let verifier = JwtService::new(JwtConfig::new("shared_access", "shared_refresh"));

        let (token, _) = minter.sign_access_token(Uuid::new_v4(), "Ada").unwrap();

        let result = verifier.verify_access_token(&token);
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_expired_access_token() {
        // Negative expiration so the token is already past its window
        let config = JwtConfig::new("a", "r").access_token_expiration(-1);
        let service = JwtService::new(config);

        let (token, _) = service.sign_access_token(Uuid::new_v4(), "Ada").unwrap();

        let result = service.verify_access_token(&token);
        assert!(
            matches!(result, Err(JwtError::Expired)),
            "Expected Expired error, got: {:?}",
            result
        );
    }

    #[test]
    fn test_expired_refresh_token() {
        let config = JwtConfig::new("a", "r").refresh_token_expiration(-1);
        let service = JwtService::new(config);

        let (token, _) = service.sign_refresh_token(Uuid::new_v4()).unwrap();

        let result = service.verify_refresh_token(&token);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_jwt_error_display() {
        assert_eq!(format!("{}", JwtError::Expired), "Token expired");
        assert_eq!(format!("{}", JwtError::InvalidToken), "Invalid token");
        assert_eq!(
            format!("{}", JwtError::MissingAccessSecret),
            "JWT_SECRET environment variable not set"
        );
    }
}
