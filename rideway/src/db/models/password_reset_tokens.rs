//! Database models for password reset tokens.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::AccountKind;

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub account_kind: AccountKind,
    pub account_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    #[allow(dead_code)]
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    /// The opaque value sent to the account owner: `{id}.{raw}`.
    pub fn link_token(&self, raw_token: &str) -> String {
        format!("{}.{}", self.id, raw_token)
    }
}

/// Request for creating a password reset token
#[derive(Debug, Clone)]
pub struct PasswordResetTokenCreateRequest {
    pub account_kind: AccountKind,
    pub account_id: Uuid,
    pub raw_token: String,
    pub expires_at: DateTime<Utc>,
    pub argon2_params: crate::auth::password::Argon2Params,
}

/// Split a `{id}.{raw}` link token. `None` if it is not of that shape.
pub fn parse_link_token(token: &str) -> Option<(Uuid, &str)> {
    let (id, raw) = token.split_once('.')?;
    let id = Uuid::parse_str(id).ok()?;
    (!raw.is_empty()).then_some((id, raw))
}
