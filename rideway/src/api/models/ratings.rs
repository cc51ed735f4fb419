//! API request/response models for ride ratings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::validation::Validator;
use crate::db::models::ratings::RatingDBResponse;
use crate::errors::Result;
use crate::types::{RatingId, RideId};

/// Longest feedback accepted, in characters
pub const MAX_FEEDBACK_CHARS: usize = 500;

/// Rating body. `comment` is accepted as an alias of `feedback`, and `rideId` is ignored when the
/// ride comes from the path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RatingRequest {
    pub ride_id: Option<String>,
    #[schema(value_type = Option<i64>, minimum = 1, maximum = 5)]
    pub rating: Option<serde_json::Value>,
    #[serde(alias = "comment")]
    pub feedback: Option<String>,
}

/// A validated rating
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSubmission {
    pub ride_id: RideId,
    pub rating: i64,
    pub feedback: Option<String>,
}

impl RatingRequest {
    /// Validate against the ride id in the body.
    pub fn validate(&self) -> Result<RatingSubmission> {
        let mut v = Validator::body();
        let ride_id = v.id("rideId", self.ride_id.as_deref());
        let (rating, feedback) = self.validate_fields(&mut v);
        v.finish()?;
        Ok(RatingSubmission {
            ride_id: ride_id.unwrap_or_default(),
            rating,
            feedback,
        })
    }

    /// Validate against a ride id taken from the path.
    pub fn validate_for(&self, ride_id: RideId) -> Result<RatingSubmission> {
        let mut v = Validator::body();
        let (rating, feedback) = self.validate_fields(&mut v);
        v.finish()?;
        Ok(RatingSubmission {
            ride_id,
            rating,
            feedback,
        })
    }

    fn validate_fields(&self, v: &mut Validator) -> (i64, Option<String>) {
        let rating = self
            .rating
            .as_ref()
            .and_then(|r| r.as_i64().or_else(|| r.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)))
            .filter(|r| (1..=5).contains(r));
        v.check(rating.is_some(), "rating", "Rating must be a whole number between 1 and 5");

        let feedback = self
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        if let Some(text) = &feedback {
            v.check(
                text.chars().count() <= MAX_FEEDBACK_CHARS,
                "feedback",
                format!("Feedback must be at most {MAX_FEEDBACK_CHARS} characters"),
            );
        }
        (rating.unwrap_or_default(), feedback)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingResponse {
    #[serde(rename = "_id")]
    #[schema(value_type = String, format = "uuid")]
    pub id: RatingId,
    #[schema(value_type = String, format = "uuid")]
    pub ride_id: RideId,
    pub rating: i64,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RatingDBResponse> for RatingResponse {
    fn from(db: RatingDBResponse) -> Self {
        Self {
            id: db.id,
            ride_id: db.ride_id,
            rating: db.rating,
            feedback: db.feedback,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingSubmittedResponse {
    pub message: String,
    /// The captain's average after this rating
    pub captain_rating: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_accepts_comment_alias() {
        let ride_id = Uuid::new_v4();
        let request: RatingRequest =
            serde_json::from_value(json!({"rideId": ride_id, "rating": 4, "comment": " smooth ride "})).unwrap();
        assert_eq!(
            request.validate().unwrap(),
            RatingSubmission {
                ride_id,
                rating: 4,
                feedback: Some("smooth ride".to_string())
            }
        );
    }

    #[test]
    fn test_rating_must_be_whole_and_in_range() {
        let ride_id = Uuid::new_v4();
        for rating in [json!(0), json!(6), json!(4.5), json!("5"), json!(null)] {
            let request: RatingRequest = serde_json::from_value(json!({"rating": rating})).unwrap();
            assert!(
                matches!(request.validate_for(ride_id), Err(Error::Validation { .. })),
                "{rating} should be rejected"
            );
        }
    }

    #[test]
    fn test_feedback_length_limit() {
        let request: RatingRequest =
            serde_json::from_value(json!({"rating": 5, "feedback": "x".repeat(MAX_FEEDBACK_CHARS + 1)})).unwrap();
        assert!(request.validate_for(Uuid::new_v4()).is_err());

        let request: RatingRequest =
            serde_json::from_value(json!({"rating": 5, "feedback": "x".repeat(MAX_FEEDBACK_CHARS)})).unwrap();
        assert!(request.validate_for(Uuid::new_v4()).is_ok());
    }
}
