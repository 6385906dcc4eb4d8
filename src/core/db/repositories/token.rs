//! Refresh token store
//!
//! Persistent proof that an issued refresh token is still live. Tokens are
//! stored as sha256 digests; deleting a row revokes the token even while its
//! signature would still verify, which is what makes logout and rotation
//! effective. There is no update operation: rotation is delete-old then
//! create-new, so a crash between the steps leaves at most one extra valid
//! token outstanding, never a half-written record.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::RefreshTokenRecord;

/// Refresh token store error types
#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Refresh token store over PostgreSQL
#[derive(Clone)]
pub struct RefreshTokenRepository {
    pool: PgPool,
}

impl RefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Digest a raw token for storage and lookup
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Record a newly issued refresh token. Several records per user may be
    /// live at once (one per device/browser).
    pub async fn create(
        &self,
        user_id: Uuid,
        raw_token: &str,
    ) -> Result<RefreshTokenRecord, RefreshTokenRepositoryError> {
        let token_hash = Self::hash_token(raw_token);

        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash)
            VALUES ($1, $2)
            RETURNING id, user_id, token_hash, created_at
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Exact-match lookup by raw token (digested first)
    pub async fn find_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, RefreshTokenRepositoryError> {
        let token_hash = Self::hash_token(raw_token);

        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT id, user_id, token_hash, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Revoke a token by value. Returns whether a record existed.
    pub async fn delete_by_token(
        &self,
        raw_token: &str,
    ) -> Result<bool, RefreshTokenRepositoryError> {
        let token_hash = Self::hash_token(raw_token);

        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(&token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke a token only if it belongs to the given user
    pub async fn delete_by_user_and_token(
        &self,
        user_id: Uuid,
        raw_token: &str,
    ) -> Result<bool, RefreshTokenRepositoryError> {
        let token_hash = Self::hash_token(raw_token);

        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE user_id = $1 AND token_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every outstanding token for a user (logout everywhere)
    pub async fn delete_all_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<u64, RefreshTokenRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count live records for a user
    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, RefreshTokenRepositoryError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM refresh_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Token Digest Tests (don't require database)
    // ========================================================================

    #[test]
    fn test_hash_token_is_deterministic() {
        let token = "a_refresh_token";
        assert_eq!(
            RefreshTokenRepository::hash_token(token),
            RefreshTokenRepository::hash_token(token)
        );
    }

    #[test]
    fn test_hash_token_differs_per_token() {
        assert_ne!(
            RefreshTokenRepository::hash_token("token_one"),
            RefreshTokenRepository::hash_token("token_two")
        );
    }

    #[test]
    fn test_hash_token_produces_64_char_hex() {
        let hash = RefreshTokenRepository::hash_token("any_token");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    async fn setup_test_user() -> (PgPool, Uuid) {
        use crate::core::db::pool::{DbConfig, create_pool};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        let pool = create_pool(&config)
            .await
            .expect("Failed to create test pool");

        let user_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, 'Token Test', $2, 'test_hash')
            "#,
        )
        .bind(user_id)
        .bind(format!("token_test_{user_id}@example.com"))
        .execute(&pool)
        .await
        .expect("Failed to create test user");

        (pool, user_id)
    }

    async fn cleanup_test_user(pool: &PgPool, user_id: Uuid) {
        // Refresh token rows are removed by CASCADE
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await
            .expect("Failed to cleanup test user");
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_and_find() {
        let (pool, user_id) = setup_test_user().await;
        let repo = RefreshTokenRepository::new(pool.clone());

        let record = repo.create(user_id, "raw_token_1").await.unwrap();
        assert_eq!(record.user_id, user_id);
        assert_eq!(
            record.token_hash,
            RefreshTokenRepository::hash_token("raw_token_1")
        );

        let found = repo.find_by_token("raw_token_1").await.unwrap();
        assert_eq!(found.unwrap().id, record.id);

        cleanup_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_find_miss_after_delete() {
        let (pool, user_id) = setup_test_user().await;
        let repo = RefreshTokenRepository::new(pool.clone());

        repo.create(user_id, "deletable_token").await.unwrap();

        assert!(repo.delete_by_token("deletable_token").await.unwrap());
        assert!(repo.find_by_token("deletable_token").await.unwrap().is_none());
        // Second delete reports nothing to do
        assert!(!repo.delete_by_token("deletable_token").await.unwrap());

        cleanup_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_multiple_records_per_user() {
        let (pool, user_id) = setup_test_user().await;
        let repo = RefreshTokenRepository::new(pool.clone());

        repo.create(user_id, "device_a").await.unwrap();
        repo.create(user_id, "device_b").await.unwrap();
        repo.create(user_id, "device_c").await.unwrap();

        assert_eq!(repo.count_for_user(user_id).await.unwrap(), 3);

        let deleted = repo.delete_all_for_user(user_id).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(repo.count_for_user(user_id).await.unwrap(), 0);

        cleanup_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_delete_by_user_and_token_checks_owner() {
        let (pool, user_id) = setup_test_user().await;
        let repo = RefreshTokenRepository::new(pool.clone());

        repo.create(user_id, "owned_token").await.unwrap();

        let other_user = Uuid::new_v4();
        assert!(
            !repo
                .delete_by_user_and_token(other_user, "owned_token")
                .await
                .unwrap()
        );
        assert!(
            repo.delete_by_user_and_token(user_id, "owned_token")
                .await
                .unwrap()
        );

        cleanup_test_user(&pool, user_id).await;
    }
}
