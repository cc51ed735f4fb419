//! Request and response shapes shared by rider and captain accounts.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::validation::Validator;
use crate::config::PasswordConfig;
use crate::errors::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Fullname {
    #[serde(default)]
    pub firstname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
}

impl Fullname {
    pub fn new(firstname: &str, lastname: Option<&str>) -> Self {
        Self {
            firstname: firstname.to_string(),
            lastname: lastname.map(str::to_string),
        }
    }

    /// "First Last", or just the first name
    pub fn display(&self) -> String {
        match self.lastname.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            Some(last) => format!("{} {}", self.firstname, last),
            None => self.firstname.clone(),
        }
    }
}

/// Partial name change
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct FullnameUpdate {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

impl FullnameUpdate {
    pub fn validate(&self, v: &mut Validator) {
        if let Some(first) = &self.firstname {
            v.min_chars("fullname.firstname", first, 2, "First name must be at least 2 characters long");
        }
        if let Some(last) = &self.lastname {
            v.min_chars("fullname.lastname", last, 2, "Last name must be at least 2 characters long");
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        Validator::body()
            .email("email", &self.email)
            .check(!self.password.is_empty(), "password", "Password is required")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(&self) -> Result<()> {
        Validator::body().email("email", &self.email).finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ResetPasswordRequest {
    /// Token from the emailed link
    pub token: String,
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self, rules: &PasswordConfig) -> Result<()> {
        Validator::body()
            .check(!self.token.trim().is_empty(), "token", "Token is required")
            .password("password", &self.password, rules)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A JSON body sent with a `Set-Cookie` header
pub struct WithCookie<T> {
    pub status: StatusCode,
    pub cookie: String,
    pub body: T,
}

impl<T: Serialize> IntoResponse for WithCookie<T> {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&self.cookie) {
            Ok(value) => {
                headers.insert(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Dropping malformed session cookie: {}", e),
        }
        (self.status, headers, Json(self.body)).into_response()
    }
}
