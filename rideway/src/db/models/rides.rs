//! Database models for rides.

use crate::rides::lifecycle::{PaymentStatus, RideStatus, RideView};
use crate::types::{AccountKind, CaptainId, RideId, UserId, VehicleType};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new ride
#[derive(Debug, Clone)]
pub struct RideCreateDBRequest {
    pub user_id: UserId,
    pub pickup: String,
    pub destination: String,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub vehicle_type: VehicleType,
    pub fare: i64,
    pub distance_meters: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub otp: String,
}

/// Database response for a ride
#[derive(Debug, Clone, FromRow)]
pub struct RideDBResponse {
    pub id: RideId,
    pub user_id: UserId,
    pub captain_id: Option<CaptainId>,
    pub pickup: String,
    pub destination: String,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub vehicle_type: VehicleType,
    pub fare: i64,
    pub distance_meters: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub status: RideStatus,
    pub otp: String,
    pub payment_status: PaymentStatus,
    pub cancelled_by: Option<AccountKind>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RideDBResponse {
    pub fn view(&self) -> RideView {
        RideView {
            status: self.status,
            user_id: self.user_id,
            captain_id: self.captain_id,
        }
    }
}

/// Which side of the ride a listing is for
#[derive(Debug, Clone, Copy)]
pub enum RideParticipant {
    User(UserId),
    Captain(CaptainId),
}

/// Filter for ride lists. `participant: None` lists every ride (admin).
#[derive(Debug, Clone)]
pub struct RideFilter {
    pub participant: Option<RideParticipant>,
    pub status: Option<RideStatus>,
    pub skip: i64,
    pub limit: i64,
}

impl RideFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            participant: None,
            status: None,
            skip,
            limit,
        }
    }

    pub fn participant(mut self, participant: RideParticipant) -> Self {
        self.participant = Some(participant);
        self
    }

    pub fn status(mut self, status: RideStatus) -> Self {
        self.status = Some(status);
        self
    }
}
