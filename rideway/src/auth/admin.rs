//! The single administrator account, configured rather than stored.
//!
//! The configured password is hashed once at startup so login verification costs the same as a
//! normal account's and the plaintext is not kept in application state.

use crate::{
    auth::password::{self, Argon2Params},
    config::Config,
    errors::Error,
};

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    email: String,
    password_hash: String,
}

impl AdminCredentials {
    /// `None` when no admin is configured; admin login then always fails.
    pub async fn from_config(config: &Config) -> Result<Option<Self>, Error> {
        let (Some(email), Some(plain)) = (&config.admin.email, &config.admin.password) else {
            return Ok(None);
        };

        let password_hash = password::hash_password(plain.clone(), Argon2Params::from(&config.auth.password)).await?;
        Ok(Some(Self {
            email: email.trim().to_lowercase(),
            password_hash,
        }))
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Email is compared case-insensitively.
    pub async fn verify(&self, email: &str, password: &str) -> Result<bool, Error> {
        if !email.trim().eq_ignore_ascii_case(&self.email) {
            return Ok(false);
        }
        password::verify_password(password.to_string(), self.password_hash.clone()).await
    }
}
