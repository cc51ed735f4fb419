//! Session and password-reset steps shared by the rider and captain routes.

use chrono::Utc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::accounts::{Fullname, ResetPasswordRequest},
    auth::{
        current_user::SessionToken,
        password::{self, Argon2Params},
        session::{self, IssuedToken, Role},
    },
    db::{
        handlers::{BlacklistedTokens, Captains, PasswordResetTokens, Repository, Users},
        models::{
            captains::CaptainUpdateDBRequest, password_reset_tokens::parse_link_token, users::UserUpdateDBRequest,
        },
    },
    email::EmailService,
    errors::{Error, Result},
    types::{AccountKind, abbrev_uuid},
};

/// Returned by forgot-password whether or not the email is known
pub const RESET_REQUESTED_MESSAGE: &str = "If an account exists for that email, a password reset link has been sent";

fn invalid_reset_token() -> Error {
    Error::BadRequest {
        message: "Invalid or expired reset token".to_string(),
    }
}

/// Emails are stored and compared trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn issue_session(state: &AppState, kind: AccountKind, id: Uuid, email: &str) -> Result<IssuedToken> {
    let role = match kind {
        AccountKind::User => Role::User,
        AccountKind::Captain => Role::Captain,
    };
    session::create_session_token(id.to_string(), email, role, &state.config)
}

/// Hash `password` with the configured argon2 cost.
pub async fn hash_password(state: &AppState, password: &str) -> Result<String> {
    password::hash_password(password.to_string(), Argon2Params::from(&state.config.auth.password)).await
}

/// Blacklist the presented token until it would have expired anyway.
#[instrument(skip_all, err)]
pub async fn revoke_token(state: &AppState, token: &SessionToken) -> Result<()> {
    let mut conn = state.db.acquire().await?;
    BlacklistedTokens::new(&mut conn)
        .add(&password::token_fingerprint(&token.raw), token.claims.expires_at())
        .await?;
    debug!("Revoked session token {}", token.claims.jti);
    Ok(())
}

/// A reset link issued for an account
#[derive(Debug)]
pub struct ResetLink {
    pub account_id: Uuid,
    pub name: Fullname,
    pub url: String,
}

/// Create a reset token for the account of `kind` with `email`, if there is one.
#[instrument(skip(state, email), err)]
pub async fn issue_reset_link(state: &AppState, kind: AccountKind, email: &str) -> Result<Option<ResetLink>> {
    let mut conn = state.db.acquire().await?;

    let account = match kind {
        AccountKind::User => Users::new(&mut conn)
            .get_by_email(email)
            .await?
            .map(|u| (u.id, Fullname::new(&u.first_name, u.last_name.as_deref()))),
        AccountKind::Captain => Captains::new(&mut conn)
            .get_by_email(email)
            .await?
            .map(|c| (c.id, Fullname::new(&c.first_name, c.last_name.as_deref()))),
    };
    let Some((account_id, name)) = account else {
        return Ok(None);
    };

    let (raw_token, token) = PasswordResetTokens::new(&mut conn)
        .create_for_account(kind, account_id, &state.config)
        .await?;
    // Each account kind has its own reset page in the web client
    let page = match kind {
        AccountKind::User => "resetpassword",
        AccountKind::Captain => "captain/resetpassword",
    };
    let url = format!(
        "{}/{}/{}",
        state.config.frontend_url.trim_end_matches('/'),
        page,
        token.link_token(&raw_token)
    );
    Ok(Some(ResetLink { account_id, name, url }))
}

/// Email a reset link if `email` belongs to an account of `kind`. Unknown emails succeed silently.
pub async fn request_password_reset(state: &AppState, kind: AccountKind, email: &str) -> Result<()> {
    let email = normalize_email(email);
    let Some(link) = issue_reset_link(state, kind, &email).await? else {
        debug!("Password reset requested for unknown {} email", kind);
        return Ok(());
    };

    // The response must not reveal whether the email exists, so delivery failures are only logged
    let sent = match EmailService::new(&state.config) {
        Ok(mailer) => mailer.send_password_reset_email(&email, &link.name.display(), &link.url).await,
        Err(e) => Err(e),
    };
    match sent {
        Ok(()) => info!("Sent password reset link to {} {}", kind, abbrev_uuid(&link.account_id)),
        Err(e) => error!(
            "Failed to send password reset email to {} {}: {}",
            kind,
            abbrev_uuid(&link.account_id),
            e
        ),
    }
    Ok(())
}

/// Set a new password from a reset link and spend every outstanding token for the account.
#[instrument(skip_all, fields(kind = %kind), err)]
pub async fn reset_password(state: &AppState, kind: AccountKind, request: &ResetPasswordRequest) -> Result<()> {
    request.validate(&state.config.auth.password)?;
    let (token_id, raw_token) = parse_link_token(request.token.trim()).ok_or_else(invalid_reset_token)?;
    let password_hash = hash_password(state, &request.password).await?;

    let mut tx = state.db.begin().await?;
    let token = PasswordResetTokens::new(&mut tx)
        .find_valid_token_by_id(token_id, raw_token)
        .await?
        .filter(|t| t.account_kind == kind)
        .ok_or_else(invalid_reset_token)?;

    match kind {
        AccountKind::User => {
            let update = UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            };
            Users::new(&mut tx).update(token.account_id, &update).await?;
        }
        AccountKind::Captain => {
            let update = CaptainUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            };
            Captains::new(&mut tx).update(token.account_id, &update).await?;
        }
    }
    PasswordResetTokens::new(&mut tx)
        .invalidate_for_account(kind, token.account_id)
        .await?;
    tx.commit().await?;

    info!("Password reset for {} {} at {}", kind, abbrev_uuid(&token.account_id), Utc::now());
    Ok(())
}
