//! Common type definitions shared across layers.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases for readability:
//!
//! - [`UserId`]: Rider account identifier
//! - [`CaptainId`]: Driver account identifier
//! - [`RideId`]: Ride identifier
//! - [`RatingId`]: Rating identifier
//! - [`PaymentId`]: Local payment record identifier
//!
//! # Account kinds
//!
//! [`AccountKind`] distinguishes the two self-service account tables (users and captains). It is
//! persisted on password reset tokens and used to route socket connections.
//!
//! # Vehicle types
//!
//! [`VehicleType`] is shared by captains (what they drive), rides (what was requested) and the fare
//! table.
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type CaptainId = Uuid;
pub type RideId = Uuid;
pub type RatingId = Uuid;
pub type PaymentId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// The two kinds of self-service account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Captain,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::User => "user",
            AccountKind::Captain => "captain",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle classes a ride can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Auto,
    Bike,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [VehicleType::Auto, VehicleType::Car, VehicleType::Bike];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Auto => "auto",
            VehicleType::Bike => "bike",
        }
    }
}

impl std::str::FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(VehicleType::Car),
            "auto" => Ok(VehicleType::Auto),
            "bike" | "moto" | "motorcycle" => Ok(VehicleType::Bike),
            other => Err(format!("unknown vehicle type {other:?}")),
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_account_kind_serde() {
        assert_eq!(serde_json::to_string(&AccountKind::Captain).unwrap(), "\"captain\"");
        let kind: AccountKind = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(kind, AccountKind::User);
    }

    #[test]
    fn test_vehicle_type_serde() {
        assert_eq!(serde_json::to_string(&VehicleType::Auto).unwrap(), "\"auto\"");
        assert!(serde_json::from_str::<VehicleType>("\"truck\"").is_err());
    }

    #[test]
    fn test_vehicle_type_from_str() {
        assert_eq!("Car".parse::<VehicleType>(), Ok(VehicleType::Car));
        assert_eq!(" moto ".parse::<VehicleType>(), Ok(VehicleType::Bike));
        assert!("truck".parse::<VehicleType>().is_err());
    }
}
