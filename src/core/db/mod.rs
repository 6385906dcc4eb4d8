//! Database module for Eventra
//!
//! Connectivity, models and repositories for persistent storage using
//! PostgreSQL and SQLx.

pub mod models;
pub mod pool;
pub mod repositories;

pub use models::{RefreshTokenRecord, Role, User, UserResponse};
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations, health_check};
pub use repositories::{
    RefreshTokenRepository, RefreshTokenRepositoryError, UserRepository, UserRepositoryError,
};

pub use sqlx::PgPool;
