//! Double-submit CSRF guard
//!
//! A per-browser-session secret lives in an HTTP-only cookie; the client gets
//! the sha256 digest of that secret as a script-readable token and echoes it
//! back in the `x-csrf-token` header on every unsafe request. The server
//! recomputes the digest from the cookie and compares. A cross-site attacker
//! can make the browser send the cookie but cannot read it to compute the
//! matching header value.

use axum::{
    Json,
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::core::auth::api::ApiError;

/// Cookie carrying the CSRF secret (HTTP-only, never script-readable)
pub const CSRF_COOKIE_NAME: &str = "csrfSecret";

/// Header carrying the derived CSRF token on unsafe requests
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Secret cookie lifetime, aligned with a browser session's working day
const CSRF_COOKIE_MAX_AGE_HOURS: i64 = 24;

/// CSRF validation failures. Reason codes are split so a misconfigured
/// client can be debugged without logging the secret itself.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CsrfError {
    #[error("CSRF validation failed: secret missing")]
    SecretMissing,

    #[error("CSRF validation failed: token missing")]
    TokenMissing,

    #[error("CSRF validation failed: token mismatch")]
    TokenMismatch,
}

impl CsrfError {
    fn code(&self) -> &'static str {
        match self {
            CsrfError::SecretMissing => "CSRF_SECRET_MISSING",
            CsrfError::TokenMissing => "CSRF_TOKEN_MISSING",
            CsrfError::TokenMismatch => "CSRF_TOKEN_MISMATCH",
        }
    }
}

impl IntoResponse for CsrfError {
    fn into_response(self) -> Response {
        let body = ApiError::new(self.to_string(), self.code());
        (StatusCode::FORBIDDEN, Json(body)).into_response()
    }
}

/// Derive the CSRF token from a secret: deterministic sha256 digest, hex
/// encoded. Validation is "recompute and compare", no verify function exists.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a fresh 256-bit CSRF secret
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issue or reuse the CSRF secret and return the derived token.
///
/// Idempotent with respect to an existing cookie: repeated calls within the
/// cookie's lifetime yield the same token. The returned jar MUST be part of
/// the response, otherwise the Set-Cookie for a fresh secret is lost; this
/// makes the secret-then-token ordering an explicit two-step protocol
/// instead of a convention callers have to remember.
pub fn ensure_secret(jar: CookieJar) -> (CookieJar, String) {
    if let Some(cookie) = jar.get(CSRF_COOKIE_NAME) {
        let token = hash_secret(cookie.value());
        (jar, token)
    } else {
        let secret = generate_secret();
        let token = hash_secret(&secret);
        (jar.add(secret_cookie(secret)), token)
    }
}

fn secret_cookie(secret: String) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE_NAME, secret))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .max_age(time::Duration::hours(CSRF_COOKIE_MAX_AGE_HOURS))
        .build()
}

/// Pure validation step: safe methods always pass, unsafe methods need both
/// the cookie-borne secret and the header-borne token, matched by digest.
pub fn validate(
    method: &Method,
    secret: Option<&str>,
    token: Option<&str>,
) -> Result<(), CsrfError> {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(());
    }

    let secret = secret.ok_or(CsrfError::SecretMissing)?;
    let token = token.ok_or(CsrfError::TokenMissing)?;

    if hash_secret(secret) != token {
        return Err(CsrfError::TokenMismatch);
    }

    Ok(())
}

/// Axum middleware enforcing the double-submit check on unsafe requests
pub async fn validate_request(jar: CookieJar, req: Request, next: Next) -> Response {
    let secret = jar.get(CSRF_COOKIE_NAME).map(|c| c.value().to_string());
    let token = req
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match validate(req.method(), secret.as_deref(), token.as_deref()) {
        Ok(()) => next.run(req).await,
        Err(err) => {
            tracing::warn!("{} {}: {err}", req.method(), req.uri().path());
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_secret_is_deterministic() {
        let secret = "a_csrf_secret";
        assert_eq!(hash_secret(secret), hash_secret(secret));
    }

    #[test]
    fn test_hash_secret_is_sensitive_to_one_byte() {
        assert_ne!(hash_secret("secret_a"), hash_secret("secret_b"));
    }

    #[test]
    fn test_hash_secret_produces_64_char_hex() {
        let hash = hash_secret("anything");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_secret_is_random_and_hex() {
        let a = generate_secret();
        let b = generate_secret();

        // 32 bytes hex encoded
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_ensure_secret_sets_hardened_cookie() {
        let (jar, token) = ensure_secret(CookieJar::new());

        let cookie = jar.get(CSRF_COOKIE_NAME).expect("secret cookie set");
        assert_eq!(token, hash_secret(cookie.value()));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::hours(CSRF_COOKIE_MAX_AGE_HOURS))
        );
    }

    #[test]
    fn test_ensure_secret_is_idempotent() {
        let (jar, first) = ensure_secret(CookieJar::new());
        let secret = jar.get(CSRF_COOKIE_NAME).unwrap().value().to_string();

        let (jar, second) = ensure_secret(jar);

        assert_eq!(first, second);
        assert_eq!(jar.get(CSRF_COOKIE_NAME).unwrap().value(), secret);
    }

    #[test]
    fn test_validate_safe_methods_pass_without_material() {
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert_eq!(validate(&method, None, None), Ok(()));
        }
    }

    #[test]
    fn test_validate_unsafe_method_missing_secret() {
        let token = hash_secret("some_secret");
        let result = validate(&Method::POST, None, Some(token.as_str()));
        assert_eq!(result, Err(CsrfError::SecretMissing));
    }

    #[test]
    fn test_validate_unsafe_method_missing_token() {
        let result = validate(&Method::DELETE, Some("some_secret"), None);
        assert_eq!(result, Err(CsrfError::TokenMissing));
    }

    #[test]
    fn test_validate_token_mismatch() {
        let wrong = hash_secret("another_secret");
        let result = validate(&Method::PUT, Some("some_secret"), Some(wrong.as_str()));
        assert_eq!(result, Err(CsrfError::TokenMismatch));
    }

    #[test]
    fn test_validate_matched_pair_passes() {
        let secret = generate_secret();
        let token = hash_secret(&secret);

        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert_eq!(
                validate(&method, Some(secret.as_str()), Some(token.as_str())),
                Ok(())
            );
        }
    }

    #[test]
    fn test_csrf_error_maps_to_403() {
        for err in [
            CsrfError::SecretMissing,
            CsrfError::TokenMissing,
            CsrfError::TokenMismatch,
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }
}
