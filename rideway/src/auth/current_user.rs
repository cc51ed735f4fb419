//! Extractors for the authenticated account behind a request.
//!
//! The session token is looked up in order: the session cookie, a `token` header, and an
//! `Authorization: Bearer` header. Only [`SocketPrincipal`] also reads a `token` query parameter,
//! since browsers cannot set headers on WebSocket upgrades. Revoked tokens are rejected.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

use crate::{
    AppState,
    auth::{
        password::token_fingerprint,
        session::{self, Role, SessionClaims},
    },
    config::Config,
    db::{
        handlers::{BlacklistedTokens, Captains, Repository, Users},
        models::{captains::CaptainDBResponse, users::UserDBResponse},
    },
    errors::{Error, Result},
    rides::lifecycle::Actor,
    types::AccountKind,
};

/// A verified, unrevoked session token
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub raw: String,
    pub claims: SessionClaims,
}

/// A signed-in rider
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserDBResponse,
    pub token: SessionToken,
}

/// A signed-in captain
#[derive(Debug, Clone)]
pub struct CurrentCaptain {
    pub captain: CaptainDBResponse,
    pub token: SessionToken,
}

/// A signed-in administrator
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub token: SessionToken,
}

/// Either a rider or a captain
#[derive(Debug, Clone)]
pub enum Principal {
    User(CurrentUser),
    Captain(CurrentCaptain),
}

impl Principal {
    pub fn id(&self) -> uuid::Uuid {
        match self {
            Principal::User(u) => u.user.id,
            Principal::Captain(c) => c.captain.id,
        }
    }

    pub fn kind(&self) -> AccountKind {
        match self {
            Principal::User(_) => AccountKind::User,
            Principal::Captain(_) => AccountKind::Captain,
        }
    }

    pub fn actor(&self) -> Actor {
        match self {
            Principal::User(u) => Actor::User(u.user.id),
            Principal::Captain(c) => Actor::Captain(c.captain.id),
        }
    }
}

fn blocked() -> Error {
    Error::Forbidden {
        message: "Account is blocked".to_string(),
    }
}

fn cookie_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    let cookie_str = parts.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookie_str.split(';').find_map(|cookie| {
        let (name, value) = cookie.trim().split_once('=')?;
        (name == cookie_name && !value.is_empty()).then(|| value.to_string())
    })
}

fn header_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get("token")?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let auth_str = parts.headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn query_token(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.is_empty())
}

/// Find the raw session token in a request's cookie or headers, if any.
pub fn extract_token(parts: &Parts, config: &Config) -> Option<String> {
    cookie_token(parts, &config.auth.session.cookie_name)
        .or_else(|| header_token(parts))
        .or_else(|| bearer_token(parts))
}

/// As [`extract_token`], falling back to the `token` query parameter of a socket upgrade.
pub fn extract_socket_token(parts: &Parts, config: &Config) -> Option<String> {
    extract_token(parts, config).or_else(|| query_token(parts))
}

/// Verify the request's token and check it has not been revoked.
async fn authenticate(parts: &Parts, state: &AppState) -> Result<SessionToken> {
    verify(extract_token(parts, &state.config), state).await
}

#[instrument(skip_all)]
async fn verify(raw: Option<String>, state: &AppState) -> Result<SessionToken> {
    let Some(raw) = raw else {
        trace!("No session token on request");
        return Err(Error::Unauthenticated { message: None });
    };

    let claims = session::verify_session_token(&raw, &state.config)?;

    let mut conn = state.db.acquire().await?;
    if BlacklistedTokens::new(&mut conn).is_blacklisted(&token_fingerprint(&raw)).await? {
        trace!("Session token has been revoked");
        return Err(Error::Unauthenticated { message: None });
    }

    Ok(SessionToken { raw, claims })
}

async fn load_user(token: SessionToken, state: &AppState) -> Result<CurrentUser> {
    let id = token.claims.account_id().ok_or(Error::Unauthenticated { message: None })?;
    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    if user.is_blocked {
        return Err(blocked());
    }
    Ok(CurrentUser { user, token })
}

async fn load_captain(token: SessionToken, state: &AppState) -> Result<CurrentCaptain> {
    let id = token.claims.account_id().ok_or(Error::Unauthenticated { message: None })?;
    let mut conn = state.db.acquire().await?;
    let captain = Captains::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    if captain.is_blocked {
        return Err(blocked());
    }
    Ok(CurrentCaptain { captain, token })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = authenticate(parts, state).await?;
        if token.claims.role != Role::User {
            return Err(Error::Unauthenticated { message: None });
        }
        load_user(token, state).await
    }
}

impl FromRequestParts<AppState> for CurrentCaptain {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = authenticate(parts, state).await?;
        if token.claims.role != Role::Captain {
            return Err(Error::Unauthenticated { message: None });
        }
        load_captain(token, state).await
    }
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = authenticate(parts, state).await?;
        if token.claims.role != Role::Admin {
            return Err(Error::Forbidden {
                message: "Admin access required".to_string(),
            });
        }
        Ok(AdminSession { token })
    }
}

async fn load_principal(token: SessionToken, state: &AppState) -> Result<Principal> {
    match token.claims.role {
        Role::User => Ok(Principal::User(load_user(token, state).await?)),
        Role::Captain => Ok(Principal::Captain(load_captain(token, state).await?)),
        Role::Admin => Err(Error::Unauthenticated { message: None }),
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = authenticate(parts, state).await?;
        load_principal(token, state).await
    }
}

/// A rider or captain opening the realtime socket
#[derive(Debug, Clone)]
pub struct SocketPrincipal(pub Principal);

impl FromRequestParts<AppState> for SocketPrincipal {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = verify(extract_socket_token(parts, &state.config), state).await?;
        Ok(SocketPrincipal(load_principal(token, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::BlacklistedTokens;
    use crate::test_utils::{create_test_captain, create_test_state, create_test_user, token_for_captain, token_for_user};
    use crate::types::VehicleType;
    use axum::http::Request;
    use sqlx::SqlitePool;

    fn parts_with(header: (&str, &str), uri: &str) -> Parts {
        let (parts, _) = Request::builder().uri(uri).header(header.0, header.1).body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_token_source_precedence() {
        let config = crate::test_utils::create_test_config();

        let (parts, _) = Request::builder()
            .uri("http://localhost/x?token=from-query")
            .header("cookie", "other=1; token=from-cookie")
            .header("token", "from-header")
            .header("authorization", "Bearer from-bearer")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(extract_token(&parts, &config).as_deref(), Some("from-cookie"));

        let parts = parts_with(("token", "from-header"), "http://localhost/x?token=q");
        assert_eq!(extract_token(&parts, &config).as_deref(), Some("from-header"));

        let parts = parts_with(("authorization", "Bearer from-bearer"), "http://localhost/x");
        assert_eq!(extract_token(&parts, &config).as_deref(), Some("from-bearer"));

        // The query string only counts for socket upgrades
        let parts = parts_with(("x-other", "1"), "http://localhost/ws?token=from%20query");
        assert_eq!(extract_token(&parts, &config), None);
        assert_eq!(extract_socket_token(&parts, &config).as_deref(), Some("from query"));

        let parts = parts_with(("token", "from-header"), "http://localhost/ws?token=q");
        assert_eq!(extract_socket_token(&parts, &config).as_deref(), Some("from-header"));

        let parts = parts_with(("authorization", "Basic abc"), "http://localhost/x");
        assert_eq!(extract_token(&parts, &config), None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_current_user_extraction(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;
        let token = token_for_user(&user, &state.config);

        let mut parts = parts_with(("authorization", &format!("Bearer {token}")), "http://localhost/user/profile");
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.user.id, user.id);

        // A user token is not a captain session
        let mut parts = parts_with(("authorization", &format!("Bearer {token}")), "http://localhost/captain/profile");
        assert!(matches!(
            CurrentCaptain::from_request_parts(&mut parts, &state).await,
            Err(Error::Unauthenticated { .. })
        ));

        // Nor an admin one
        let mut parts = parts_with(("authorization", &format!("Bearer {token}")), "http://localhost/admin/dashboard");
        assert!(matches!(
            AdminSession::from_request_parts(&mut parts, &state).await,
            Err(Error::Forbidden { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_revoked_token_is_rejected(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;
        let token = token_for_user(&user, &state.config);

        let mut conn = pool.acquire().await.unwrap();
        BlacklistedTokens::new(&mut conn)
            .add(&token_fingerprint(&token), chrono::Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        let mut parts = parts_with(("token", &token), "http://localhost/user/profile");
        assert!(matches!(
            CurrentUser::from_request_parts(&mut parts, &state).await,
            Err(Error::Unauthenticated { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_blocked_captain_is_forbidden(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let captain = create_test_captain(&pool, VehicleType::Bike).await;
        let token = token_for_captain(&captain, &state.config);

        let mut conn = pool.acquire().await.unwrap();
        Captains::new(&mut conn).toggle_block(captain.id).await.unwrap();

        let mut parts = parts_with(("token", &token), "http://localhost/ws");
        match Principal::from_request_parts(&mut parts, &state).await {
            Err(Error::Forbidden { message }) => assert_eq!(message, "Account is blocked"),
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_principal_resolves_both_kinds(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Car).await;

        let mut parts = parts_with(("token", &token_for_user(&user, &state.config)), "http://localhost/map");
        let principal = Principal::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.kind(), AccountKind::User);
        assert_eq!(principal.id(), user.id);

        let uri = format!("http://localhost/ws?token={}", token_for_captain(&captain, &state.config));
        let mut parts = parts_with(("x-other", "1"), &uri);
        let SocketPrincipal(principal) = SocketPrincipal::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.kind(), AccountKind::Captain);
        assert!(matches!(principal.actor(), Actor::Captain(id) if id == captain.id));

        // The same query token is ignored outside the socket upgrade
        let mut parts = parts_with(("x-other", "1"), &uri);
        assert!(matches!(
            Principal::from_request_parts(&mut parts, &state).await,
            Err(Error::Unauthenticated { .. })
        ));
    }
}
