//! Database repository for password reset tokens.
//!
//! Tokens belong to either a user or a captain. Only an argon2 hash of the raw token is stored.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::password,
    config::Config,
    db::{
        errors::{DbError, Result},
        models::password_reset_tokens::{PasswordResetToken, PasswordResetTokenCreateRequest},
    },
    types::{AccountKind, abbrev_uuid},
};

pub struct PasswordResetTokens<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> PasswordResetTokens<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(account_kind = %request.account_kind), err)]
    pub async fn create(&mut self, request: &PasswordResetTokenCreateRequest) -> Result<PasswordResetToken> {
        let token_hash = password::hash_string(&request.raw_token, request.argon2_params).map_err(|e| DbError::Other(anyhow::anyhow!(e)))?;

        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (id, account_kind, account_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.account_kind)
        .bind(request.account_id)
        .bind(token_hash)
        .bind(request.expires_at)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<PasswordResetToken>> {
        let token = sqlx::query_as::<_, PasswordResetToken>("SELECT * FROM password_reset_tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(token)
    }

    /// Issue a fresh token for an account. Returns the raw token alongside the stored row; the
    /// raw value is never persisted.
    #[instrument(skip(self, config), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn create_for_account(
        &mut self,
        account_kind: AccountKind,
        account_id: Uuid,
        config: &Config,
    ) -> Result<(String, PasswordResetToken)> {
        let raw_token = password::generate_reset_token();
        let expires_at =
            Utc::now() + chrono::Duration::from_std(config.auth.password_reset_token_duration).unwrap_or(chrono::Duration::minutes(30));

        let request = PasswordResetTokenCreateRequest {
            account_kind,
            account_id,
            raw_token: raw_token.clone(),
            expires_at,
            argon2_params: (&config.auth.password).into(),
        };

        let token = self.create(&request).await?;
        Ok((raw_token, token))
    }

    /// Find an unused, unexpired token by ID whose hash matches `raw_token`.
    #[instrument(skip(self, raw_token), err)]
    pub async fn find_valid_token_by_id(&mut self, token_id: Uuid, raw_token: &str) -> Result<Option<PasswordResetToken>> {
        let Some(token) = self.get_by_id(token_id).await? else {
            return Ok(None);
        };

        if token.used_at.is_some() || Utc::now() > token.expires_at {
            return Ok(None);
        }

        match password::verify_string(raw_token, &token.token_hash) {
            Ok(true) => Ok(Some(token)),
            Ok(false) => Ok(None),
            Err(e) => {
                tracing::error!("Token verification error for token {}: {:?}", token_id, e);
                Ok(None)
            }
        }
    }

    /// Mark every outstanding token for the account as used.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn invalidate_for_account(&mut self, account_kind: AccountKind, account_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used_at = ? WHERE account_kind = ? AND account_id = ? AND used_at IS NULL",
        )
        .bind(Utc::now())
        .bind(account_kind)
        .bind(account_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete tokens that are used or past expiry.
    #[instrument(skip(self), err)]
    pub async fn purge_stale(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE used_at IS NOT NULL OR expires_at < ?")
            .bind(Utc::now())
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
