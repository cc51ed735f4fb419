//! API request/response models for rides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::models::captains::CaptainResponse;
use crate::api::models::ratings::RatingResponse;
use crate::api::models::users::UserResponse;
use crate::api::models::validation::Validator;
use crate::db::models::rides::RideDBResponse;
use crate::errors::Result;
use crate::maps::{Coordinates, Measure};
use crate::rides::fare::FareQuote;
use crate::rides::lifecycle::{PaymentStatus, RideStatus};
use crate::types::{AccountKind, CaptainId, RideId, UserId, VehicleType};

/// Shortest pickup or destination accepted
const MIN_ADDRESS_CHARS: usize = 3;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FareQuery {
    pub pickup: Option<String>,
    pub destination: Option<String>,
}

impl FareQuery {
    /// The trimmed `(pickup, destination)` pair.
    pub fn validate(&self) -> Result<(String, String)> {
        let pickup = self.pickup.as_deref().unwrap_or_default().trim();
        let destination = self.destination.as_deref().unwrap_or_default().trim();
        Validator::query()
            .min_chars("pickup", pickup, MIN_ADDRESS_CHARS, "Invalid pickup address")
            .min_chars("destination", destination, MIN_ADDRESS_CHARS, "Invalid destination address")
            .finish()?;
        Ok((pickup.to_string(), destination.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FareResponse {
    pub fare: FareQuote,
    pub distance: Measure,
    pub duration: Measure,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateRideRequest {
    pub pickup: String,
    pub destination: String,
    pub vehicle_type: String,
}

/// A validated ride request
#[derive(Debug, Clone)]
pub struct NewRide {
    pub pickup: String,
    pub destination: String,
    pub vehicle_type: VehicleType,
}

impl CreateRideRequest {
    pub fn validate(&self) -> Result<NewRide> {
        let mut v = Validator::body();
        v.min_chars("pickup", &self.pickup, MIN_ADDRESS_CHARS, "Invalid pickup address")
            .min_chars("destination", &self.destination, MIN_ADDRESS_CHARS, "Invalid destination address");
        let vehicle_type = self.vehicle_type.parse::<VehicleType>().ok();
        v.check(vehicle_type.is_some(), "vehicleType", "Invalid vehicle type");
        v.finish()?;

        Ok(NewRide {
            pickup: self.pickup.trim().to_string(),
            destination: self.destination.trim().to_string(),
            vehicle_type: vehicle_type.unwrap_or(VehicleType::Car),
        })
    }
}

/// `?rideId=` for cancel
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RideIdQuery {
    pub ride_id: Option<String>,
}

impl RideIdQuery {
    pub fn validate(&self) -> Result<RideId> {
        let mut v = Validator::query();
        let id = v.id("rideId", self.ride_id.as_deref());
        v.finish()?;
        Ok(id.unwrap_or_default())
    }
}

/// `{rideId}` body for confirm, end and captain cancel
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RideIdBody {
    pub ride_id: Option<String>,
}

impl RideIdBody {
    pub fn validate(&self) -> Result<RideId> {
        let mut v = Validator::body();
        let id = v.id("rideId", self.ride_id.as_deref());
        v.finish()?;
        Ok(id.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StartRideQuery {
    pub ride_id: Option<String>,
    pub otp: Option<String>,
}

impl StartRideQuery {
    pub fn validate(&self, otp_length: usize) -> Result<(RideId, String)> {
        let mut v = Validator::query();
        let id = v.id("rideId", self.ride_id.as_deref());
        let otp = self.otp.as_deref().unwrap_or_default().trim();
        v.check(
            otp.len() == otp_length && otp.bytes().all(|b| b.is_ascii_digit()),
            "otp",
            "Invalid OTP",
        );
        v.finish()?;
        Ok((id.unwrap_or_default(), otp.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RideResponse {
    #[serde(rename = "_id")]
    #[schema(value_type = String, format = "uuid")]
    pub id: RideId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub captain_id: Option<CaptainId>,
    pub pickup: String,
    pub destination: String,
    pub pickup_location: Option<Coordinates>,
    pub vehicle_type: VehicleType,
    /// Whole currency units
    pub fare: i64,
    /// Metres
    pub distance: Option<i64>,
    /// Seconds
    pub duration: Option<i64>,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub cancelled_by: Option<AccountKind>,
    /// Only shown to the rider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captain: Option<CaptainResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingResponse>,
}

impl RideResponse {
    fn build(db: RideDBResponse, include_otp: bool) -> Self {
        let pickup_location = db.pickup_latitude.zip(db.pickup_longitude).map(|(ltd, lng)| Coordinates { ltd, lng });
        Self {
            id: db.id,
            user_id: db.user_id,
            captain_id: db.captain_id,
            pickup: db.pickup,
            destination: db.destination,
            pickup_location,
            vehicle_type: db.vehicle_type,
            fare: db.fare,
            distance: db.distance_meters,
            duration: db.duration_seconds,
            status: db.status,
            payment_status: db.payment_status,
            cancelled_by: db.cancelled_by,
            otp: include_otp.then_some(db.otp),
            created_at: db.created_at,
            confirmed_at: db.confirmed_at,
            started_at: db.started_at,
            completed_at: db.completed_at,
            cancelled_at: db.cancelled_at,
            user: None,
            captain: None,
            rating: None,
        }
    }

    /// The rider's view, OTP included
    pub fn for_rider(db: RideDBResponse) -> Self {
        Self::build(db, true)
    }

    pub fn without_otp(db: RideDBResponse) -> Self {
        Self::build(db, false)
    }

    pub fn with_user(mut self, user: impl Into<UserResponse>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_captain(mut self, captain: impl Into<CaptainResponse>) -> Self {
        self.captain = Some(captain.into());
        self
    }

    pub fn with_rating(mut self, rating: impl Into<RatingResponse>) -> Self {
        self.rating = Some(rating.into());
        self
    }
}
