//! API request/response models for riders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::accounts::{Fullname, FullnameUpdate};
use crate::api::models::validation::Validator;
use crate::config::PasswordConfig;
use crate::db::models::users::{UserDBResponse, UserUpdateDBRequest};
use crate::errors::Result;
use crate::types::UserId;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UserRegister {
    pub fullname: Fullname,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

impl UserRegister {
    pub fn validate(&self, rules: &PasswordConfig) -> Result<()> {
        let mut v = Validator::body();
        v.email("email", &self.email)
            .password("password", &self.password, rules)
            .min_chars(
                "fullname.firstname",
                &self.fullname.firstname,
                2,
                "First name must be at least 2 characters long",
            );
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            v.phone("phone", phone);
        }
        v.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserUpdateData {
    pub fullname: Option<FullnameUpdate>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default)]
    pub user_data: UserUpdateData,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut v = Validator::body();
        if let Some(fullname) = &self.user_data.fullname {
            fullname.validate(&mut v);
        }
        if let Some(phone) = self.user_data.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            v.phone("phone", phone);
        }
        v.finish()
    }

    pub fn into_db_request(self) -> UserUpdateDBRequest {
        let UserUpdateData { fullname, phone } = self.user_data;
        let fullname = fullname.unwrap_or_default();
        UserUpdateDBRequest {
            first_name: fullname.firstname.map(|f| f.trim().to_string()),
            last_name: fullname.lastname.map(|l| l.trim().to_string()),
            phone: phone.map(|p| p.trim().to_string()),
            password_hash: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub fullname: Fullname,
    pub email: String,
    pub phone: Option<String>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            fullname: Fullname {
                firstname: db.first_name,
                lastname: db.last_name,
            },
            email: db.email,
            phone: db.phone,
            is_blocked: db.is_blocked,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Returned by register and login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserAuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfileResponse {
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserUpdateResponse {
    pub message: String,
    pub user: UserResponse,
}
