//! Database repositories
//!
//! Repositories encapsulate data access so the auth service never writes SQL.

pub mod token;
pub mod user;

pub use token::{RefreshTokenRepository, RefreshTokenRepositoryError};
pub use user::{UserRepository, UserRepositoryError};
