//! API request/response models for captains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::accounts::{Fullname, FullnameUpdate};
use crate::api::models::rides::RideResponse;
use crate::api::models::validation::Validator;
use crate::config::PasswordConfig;
use crate::db::handlers::analytics::CaptainStats;
use crate::db::models::captains::{CaptainDBResponse, CaptainStatus, CaptainUpdateDBRequest, VehicleDetails};
use crate::errors::Result;
use crate::maps::Coordinates;
use crate::types::{CaptainId, VehicleType};

/// Vehicle as submitted at registration. `number` is accepted for `plate` and `vehicleType` for
/// `type`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct VehicleInput {
    pub color: String,
    #[serde(alias = "number")]
    pub plate: String,
    pub capacity: i64,
    #[serde(rename = "type", alias = "vehicleType")]
    pub vehicle_type: String,
}

impl VehicleInput {
    fn validate(&self, v: &mut Validator) -> Option<VehicleType> {
        v.check(!self.color.trim().is_empty(), "vehicle.color", "Vehicle color is required")
            .check(!self.plate.trim().is_empty(), "vehicle.plate", "Vehicle plate is required")
            .check(self.capacity >= 1, "vehicle.capacity", "Capacity must be at least 1");
        let vehicle_type = self.vehicle_type.parse::<VehicleType>().ok();
        v.check(vehicle_type.is_some(), "vehicle.type", "Invalid vehicle type");
        vehicle_type
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CaptainRegister {
    pub fullname: Fullname,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub vehicle: VehicleInput,
}

impl CaptainRegister {
    /// Validate and return the vehicle details ready for storage.
    pub fn validate(&self, rules: &PasswordConfig) -> Result<VehicleDetails> {
        let mut v = Validator::body();
        v.email("email", &self.email)
            .password("password", &self.password, rules)
            .phone("phone", &self.phone)
            .min_chars(
                "fullname.firstname",
                &self.fullname.firstname,
                3,
                "First name must be at least 3 characters long",
            );
        let vehicle_type = self.vehicle.validate(&mut v);
        v.finish()?;

        Ok(VehicleDetails {
            color: self.vehicle.color.trim().to_string(),
            plate: self.vehicle.plate.trim().to_uppercase(),
            capacity: self.vehicle.capacity,
            // validate() has already rejected a missing type
            vehicle_type: vehicle_type.unwrap_or(VehicleType::Car),
        })
    }
}

/// Partial vehicle change
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    pub color: Option<String>,
    #[serde(alias = "number")]
    pub plate: Option<String>,
    pub capacity: Option<i64>,
    #[serde(rename = "type", alias = "vehicleType")]
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CaptainUpdateData {
    pub fullname: Option<FullnameUpdate>,
    pub phone: Option<String>,
    pub vehicle: Option<VehicleUpdate>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptainUpdate {
    #[serde(default)]
    pub captain_data: CaptainUpdateData,
}

impl CaptainUpdate {
    pub fn into_db_request(self) -> Result<CaptainUpdateDBRequest> {
        let mut v = Validator::body();
        let CaptainUpdateData { fullname, phone, vehicle } = self.captain_data;
        let fullname = fullname.unwrap_or_default();
        fullname.validate(&mut v);
        if let Some(phone) = &phone {
            v.phone("phone", phone);
        }

        let vehicle = vehicle.unwrap_or_default();
        if let Some(color) = &vehicle.color {
            v.check(!color.trim().is_empty(), "vehicle.color", "Vehicle color is required");
        }
        if let Some(plate) = &vehicle.plate {
            v.check(!plate.trim().is_empty(), "vehicle.plate", "Vehicle plate is required");
        }
        if let Some(capacity) = vehicle.capacity {
            v.check(capacity >= 1, "vehicle.capacity", "Capacity must be at least 1");
        }
        let vehicle_type = match vehicle.vehicle_type.as_deref() {
            Some(raw) => {
                let parsed = raw.parse::<VehicleType>().ok();
                v.check(parsed.is_some(), "vehicle.type", "Invalid vehicle type");
                parsed
            }
            None => None,
        };
        v.finish()?;

        Ok(CaptainUpdateDBRequest {
            first_name: fullname.firstname.map(|f| f.trim().to_string()),
            last_name: fullname.lastname.map(|l| l.trim().to_string()),
            phone: phone.map(|p| p.trim().to_string()),
            password_hash: None,
            vehicle_color: vehicle.color.map(|c| c.trim().to_string()),
            vehicle_plate: vehicle.plate.map(|p| p.trim().to_uppercase()),
            vehicle_capacity: vehicle.capacity,
            vehicle_type,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleResponse {
    pub color: String,
    pub plate: String,
    pub capacity: i64,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptainResponse {
    #[serde(rename = "_id")]
    #[schema(value_type = String, format = "uuid")]
    pub id: CaptainId,
    pub fullname: Fullname,
    pub email: String,
    pub phone: String,
    pub vehicle: VehicleResponse,
    pub status: CaptainStatus,
    pub location: Option<Coordinates>,
    pub rating: f64,
    pub rating_count: i64,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CaptainDBResponse> for CaptainResponse {
    fn from(db: CaptainDBResponse) -> Self {
        let location = db.location().map(|(ltd, lng)| Coordinates { ltd, lng });
        Self {
            id: db.id,
            fullname: Fullname {
                firstname: db.first_name,
                lastname: db.last_name,
            },
            email: db.email,
            phone: db.phone,
            vehicle: VehicleResponse {
                color: db.vehicle_color,
                plate: db.vehicle_plate,
                capacity: db.vehicle_capacity,
                vehicle_type: db.vehicle_type,
            },
            status: db.status,
            location,
            rating: db.rating,
            rating_count: db.rating_count,
            is_blocked: db.is_blocked,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Returned by register and login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptainAuthResponse {
    pub message: String,
    pub token: String,
    pub captain: CaptainResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptainProfileResponse {
    pub captain: CaptainResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptainUpdateResponse {
    pub message: String,
    pub captain: CaptainResponse,
}

/// Dashboard numbers for the signed-in captain
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptainStatsResponse {
    pub today_rides: i64,
    pub today_earnings: i64,
    pub recent_rides: Vec<RideResponse>,
    pub rating: f64,
    /// Percent change against the previous seven days
    pub rating_change: f64,
    /// Percent change against yesterday
    pub ride_change: f64,
    /// Percent change against yesterday
    pub earnings_change: f64,
    pub active_hours: f64,
    pub hours_change: f64,
}

impl From<CaptainStats> for CaptainStatsResponse {
    fn from(stats: CaptainStats) -> Self {
        Self {
            today_rides: stats.today_rides,
            today_earnings: stats.today_earnings,
            recent_rides: stats.recent_rides.into_iter().map(RideResponse::without_otp).collect(),
            rating: stats.rating,
            rating_change: stats.rating_change,
            ride_change: stats.ride_change,
            earnings_change: stats.earnings_change,
            active_hours: 0.0,
            hours_change: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use serde_json::json;

    #[test]
    fn test_register_validation_and_normalisation() {
        let rules = PasswordConfig::default();
        let register: CaptainRegister = serde_json::from_value(json!({
            "fullname": {"firstname": "Ravi", "lastname": "Kumar"},
            "email": "ravi@example.com",
            "password": "longenough",
            "phone": "9876543210",
            "vehicle": {"color": "white", "number": " ka01ab1234 ", "capacity": 4, "type": "car"}
        }))
        .unwrap();

        let vehicle = register.validate(&rules).unwrap();
        assert_eq!(vehicle.plate, "KA01AB1234");
        assert_eq!(vehicle.vehicle_type, VehicleType::Car);
    }

    #[test]
    fn test_vehicle_type_aliases_and_response_shape() {
        let input: VehicleInput =
            serde_json::from_value(json!({"color": "red", "plate": "KA05", "capacity": 1, "vehicleType": "bike"})).unwrap();
        assert_eq!(input.vehicle_type, "bike");

        let response = serde_json::to_value(VehicleResponse {
            color: "red".to_string(),
            plate: "KA05".to_string(),
            capacity: 1,
            vehicle_type: VehicleType::Bike,
        })
        .unwrap();
        assert_eq!(response["type"], "bike");
        assert!(response.get("vehicleType").is_none());
    }

    #[test]
    fn test_register_rejects_bad_vehicle() {
        let rules = PasswordConfig::default();
        let register: CaptainRegister = serde_json::from_value(json!({
            "fullname": {"firstname": "Ra"},
            "email": "ravi@example.com",
            "password": "longenough",
            "phone": "98765",
            "vehicle": {"color": "", "plate": "KA01", "capacity": 0, "vehicleType": "truck"}
        }))
        .unwrap();

        match register.validate(&rules) {
            Err(Error::Validation { errors }) => {
                let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(
                    paths,
                    ["phone", "fullname.firstname", "vehicle.color", "vehicle.capacity", "vehicle.type"]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_update_validation() {
        let update: CaptainUpdate = serde_json::from_value(json!({
            "captainData": {"phone": "12345", "vehicle": {"vehicleType": "bike"}}
        }))
        .unwrap();
        assert!(matches!(update.into_db_request(), Err(Error::Validation { .. })));

        let update: CaptainUpdate = serde_json::from_value(json!({
            "captainData": {"fullname": {"firstname": "Ravi"}, "vehicle": {"type": "bike", "capacity": 2}}
        }))
        .unwrap();
        let db = update.into_db_request().unwrap();
        assert_eq!(db.first_name.as_deref(), Some("Ravi"));
        assert_eq!(db.vehicle_type, Some(VehicleType::Bike));
        assert_eq!(db.vehicle_capacity, Some(2));
        assert_eq!(db.phone, None);
    }
}
