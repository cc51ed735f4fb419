//! Database models for payments.

use crate::types::{PaymentId, RideId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Created,
    Paid,
}

/// Database request for recording a provider order
#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub order_id: String,
    pub user_id: UserId,
    pub ride_id: Option<RideId>,
    /// Minor currency units (paise, cents)
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
}

/// Database response for a payment
#[derive(Debug, Clone, FromRow)]
pub struct PaymentDBResponse {
    pub id: PaymentId,
    pub order_id: String,
    pub user_id: UserId,
    pub ride_id: Option<RideId>,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: PaymentRecordStatus,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
