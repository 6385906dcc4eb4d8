//! Authentication and session-security core
//!
//! - Token codec: signed, time-boxed access and refresh tokens
//! - CSRF guard: double-submit secret/token pair
//! - Rate limiting for login attempts
//! - Auth service: registration, login, rotation, logout, password reset
//! - Request guard: verified identity for protected routes

pub mod api;
pub mod csrf;
pub mod guard;
pub mod jwt;
pub mod rate_limit;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use csrf::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME, CsrfError};
pub use guard::AuthUser;
pub use jwt::{AccessClaims, JwtConfig, JwtError, JwtService, RefreshClaims};
pub use rate_limit::LoginRateLimiter;
pub use service::{AuthError, AuthService, LoginRequest, RegisterRequest};
