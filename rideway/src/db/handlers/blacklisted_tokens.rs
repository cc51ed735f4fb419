//! Revoked session tokens.
//!
//! Logout stores a fingerprint of the token until the token would have expired anyway.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::errors::Result;

pub struct BlacklistedTokens<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> BlacklistedTokens<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Revoke a token. Revoking twice is a no-op.
    #[instrument(skip(self, token_hash), err)]
    pub async fn add(&mut self, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO blacklisted_tokens (token_hash, expires_at, created_at) VALUES (?, ?, ?)")
            .bind(token_hash)
            .bind(expires_at)
            .bind(Utc::now())
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, token_hash), err)]
    pub async fn is_blacklisted(&mut self, token_hash: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM blacklisted_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(found.is_some())
    }

    /// Drop entries for tokens that have expired on their own.
    #[instrument(skip(self), err)]
    pub async fn purge_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM blacklisted_tokens WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
