//! Database models for captains.

use crate::types::{CaptainId, VehicleType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Availability for dispatch. Captains go active while their socket is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CaptainStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone)]
pub struct VehicleDetails {
    pub color: String,
    pub plate: String,
    pub capacity: i64,
    pub vehicle_type: VehicleType,
}

/// Database request for creating a new captain
#[derive(Debug, Clone)]
pub struct CaptainCreateDBRequest {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub vehicle: VehicleDetails,
}

/// Database request for updating a captain. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct CaptainUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub vehicle_color: Option<String>,
    pub vehicle_plate: Option<String>,
    pub vehicle_capacity: Option<i64>,
    pub vehicle_type: Option<VehicleType>,
}

/// Database response for a captain
#[derive(Debug, Clone, FromRow)]
pub struct CaptainDBResponse {
    pub id: CaptainId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub vehicle_color: String,
    pub vehicle_plate: String,
    pub vehicle_capacity: i64,
    pub vehicle_type: VehicleType,
    pub status: CaptainStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub rating: f64,
    pub rating_count: i64,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaptainDBResponse {
    /// Last known position as `(latitude, longitude)`.
    pub fn location(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Filter for captain lists
#[derive(Debug, Clone)]
pub struct CaptainFilter {
    pub skip: i64,
    pub limit: i64,
}

impl CaptainFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}
