//! Socket frames. Every frame is JSON `{"event": name, "data": payload}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::models::rides::RideResponse;
use crate::maps::Coordinates;
use crate::types::{AccountKind, RideId};

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Attach this connection to the signed-in account
    Join { user_id: Uuid, user_type: AccountKind },
    /// A captain's current position
    UpdateLocationCaptain { user_id: Uuid, location: Coordinates },
    /// Enter a ride's chat
    JoinRoom { ride_id: RideId },
    /// Chat message to the other party of a ride
    Message { ride_id: RideId, msg: String },
    /// The rider finished checkout; tell the captain
    PaymentSuccess { ride_id: RideId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredPayload {
    #[schema(value_type = String, format = "uuid")]
    pub ride_id: RideId,
    /// Whole currency units
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSuccessPayload {
    #[schema(value_type = String, format = "uuid")]
    pub ride_id: RideId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[schema(value_type = String, format = "uuid")]
    pub ride_id: RideId,
    pub msg: String,
    pub from: AccountKind,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorPayload {
    pub message: String,
}

/// Events the server pushes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A ride nearby is waiting for a captain (OTP withheld)
    NewRide(RideResponse),
    /// Sent to the rider, with the captain's details and location
    RideConfirmed(RideResponse),
    RideStarted(RideResponse),
    RideEnded(RideResponse),
    /// Sent to whichever party did not cancel
    RideCancelled(RideResponse),
    PaymentRequired(PaymentRequiredPayload),
    PaymentSuccess(PaymentSuccessPayload),
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(ChatMessage),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload { message: message.into() })
    }

    /// Event name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewRide(_) => "new-ride",
            ServerEvent::RideConfirmed(_) => "ride-confirmed",
            ServerEvent::RideStarted(_) => "ride-started",
            ServerEvent::RideEnded(_) => "ride-ended",
            ServerEvent::RideCancelled(_) => "ride-cancelled",
            ServerEvent::PaymentRequired(_) => "payment-required",
            ServerEvent::PaymentSuccess(_) => "payment-success",
            ServerEvent::ReceiveMessage(_) => "receiveMessage",
            ServerEvent::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_client_events() {
        let user_id = Uuid::new_v4();
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "join", "data": {"userId": user_id, "userType": "captain"}})).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                user_id,
                user_type: AccountKind::Captain
            }
        );

        let event: ClientEvent = serde_json::from_value(json!({
            "event": "update-location-captain",
            "data": {"userId": user_id, "location": {"ltd": 12.97, "lng": 77.59}}
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::UpdateLocationCaptain {
                user_id,
                location: Coordinates::new(12.97, 77.59)
            }
        );

        let ride_id = Uuid::new_v4();
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "message", "data": {"rideId": ride_id, "msg": "at the gate"}})).unwrap();
        assert_eq!(
            event,
            ClientEvent::Message {
                ride_id,
                msg: "at the gate".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_or_malformed_events_fail() {
        assert!(serde_json::from_value::<ClientEvent>(json!({"event": "teleport", "data": {}})).is_err());
        assert!(serde_json::from_value::<ClientEvent>(json!({"event": "join-room", "data": {"rideId": "nope"}})).is_err());
    }

    #[test]
    fn test_server_event_frames() {
        let ride_id = Uuid::new_v4();
        let frame = serde_json::to_value(ServerEvent::PaymentRequired(PaymentRequiredPayload {
            ride_id,
            amount: 193,
            currency: "INR".to_string(),
        }))
        .unwrap();
        assert_eq!(
            frame,
            json!({"event": "payment-required", "data": {"rideId": ride_id, "amount": 193, "currency": "INR"}})
        );

        let frame = serde_json::to_value(ServerEvent::ReceiveMessage(ChatMessage {
            ride_id,
            msg: "hi".to_string(),
            from: AccountKind::User,
            sent_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(frame["event"], "receiveMessage");
        assert_eq!(frame["data"]["from"], "user");

        assert_eq!(ServerEvent::error("x").name(), "error");
    }
}
