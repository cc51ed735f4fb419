//! JWT session token creation and verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{config::Config, errors::Error};

/// Who a session token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Captain,
    Admin,
}

/// JWT session claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,   // Subject (account ID, or "admin")
    pub email: String, // Account email
    pub role: Role,
    pub jti: Uuid, // Token ID, makes every issued token distinct
    pub iat: i64,  // Issued at
    pub exp: i64,  // Expiration time
}

impl SessionClaims {
    pub fn new(subject: impl Into<String>, email: impl Into<String>, role: Role, config: &Config) -> Self {
        let now = Utc::now();
        let lifetime = match role {
            Role::Admin => config.auth.admin_session_expiry,
            Role::User | Role::Captain => config.auth.session.timeout,
        };
        let exp = now + lifetime;

        Self {
            sub: subject.into(),
            email: email.into(),
            role,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    /// Subject as an account id. `None` for admin tokens.
    pub fn account_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// A signed token and when it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "JWT sessions: secret_key is required".to_string(),
    })
}

/// Create a JWT for an account session
pub fn create_session_token(subject: impl Into<String>, email: impl Into<String>, role: Role, config: &Config) -> Result<IssuedToken, Error> {
    let claims = SessionClaims::new(subject, email, role, config);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());

    let token = encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })?;

    Ok(IssuedToken {
        token,
        expires_at: claims.expires_at(),
    })
}

/// Verify and decode a JWT session token
pub fn verify_session_token(token: &str, config: &Config) -> Result<SessionClaims, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
        | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
        | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
        | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
        | jsonwebtoken::errors::ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    Ok(token_data.claims)
}

/// `Set-Cookie` value carrying a session token
pub fn session_cookie(token: &str, config: &Config) -> String {
    let session = &config.auth.session;
    cookie(&session.cookie_name, token, session.timeout.as_secs(), config)
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(config: &Config) -> String {
    cookie(&config.auth.session.cookie_name, "", 0, config)
}

fn cookie(name: &str, value: &str, max_age: u64, config: &Config) -> String {
    let session = &config.auth.session;
    let secure = if session.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly{}; SameSite={}; Max-Age={}",
        name, value, secure, session.cookie_same_site, max_age
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;
    use std::time::Duration;

    #[test]
    fn test_create_and_verify_session_token() {
        let config = create_test_config();
        let id = Uuid::new_v4();

        let issued = create_session_token(id.to_string(), "rider@example.com", Role::User, &config).unwrap();
        let claims = verify_session_token(&issued.token, &config).unwrap();

        assert_eq!(claims.account_id(), Some(id));
        assert_eq!(claims.email, "rider@example.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.expires_at(), issued.expires_at);
    }

    #[test]
    fn test_tokens_are_unique() {
        let config = create_test_config();
        let a = create_session_token("x", "x@example.com", Role::Captain, &config).unwrap();
        let b = create_session_token("x", "x@example.com", Role::Captain, &config).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_admin_tokens_use_admin_expiry() {
        let mut config = create_test_config();
        config.auth.session.timeout = Duration::from_secs(3600);
        config.auth.admin_session_expiry = Duration::from_secs(86400);

        let admin = SessionClaims::new("admin", "admin@example.com", Role::Admin, &config);
        let user = SessionClaims::new("u", "u@example.com", Role::User, &config);
        assert_eq!(admin.exp - admin.iat, 86400);
        assert_eq!(user.exp - user.iat, 3600);
        assert_eq!(admin.account_id(), None);
    }

    #[test]
    fn test_invalid_tokens_are_unauthenticated() {
        let config = create_test_config();
        assert!(matches!(
            verify_session_token("not.a.jwt", &config),
            Err(Error::Unauthenticated { .. })
        ));

        let issued = create_session_token("x", "x@example.com", Role::User, &config).unwrap();
        let mut other = create_test_config();
        other.secret_key = Some("a-different-secret".to_string());
        assert!(matches!(
            verify_session_token(&issued.token, &other),
            Err(Error::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = create_test_config();
        let claims = SessionClaims {
            sub: "x".to_string(),
            email: "x@example.com".to_string(),
            role: Role::User,
            jti: Uuid::new_v4(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let key = EncodingKey::from_secret(config.secret_key.as_deref().unwrap().as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        assert!(matches!(verify_session_token(&token, &config), Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_cookie_format() {
        let mut config = create_test_config();
        config.auth.session.cookie_secure = true;
        config.auth.session.timeout = Duration::from_secs(60);

        assert_eq!(session_cookie("abc", &config), "token=abc; Path=/; HttpOnly; Secure; SameSite=lax; Max-Age=60");
        assert!(clear_session_cookie(&config).ends_with("Max-Age=0"));

        config.auth.session.cookie_secure = false;
        assert!(!session_cookie("abc", &config).contains("Secure"));
    }
}
