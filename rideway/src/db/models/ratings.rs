//! Database models for ratings.

use crate::types::{CaptainId, RatingId, RideId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for rating a completed ride
#[derive(Debug, Clone)]
pub struct RatingCreateDBRequest {
    pub ride_id: RideId,
    pub user_id: UserId,
    pub rating: i64,
    pub feedback: Option<String>,
}

/// Database response for a rating
#[derive(Debug, Clone, FromRow)]
pub struct RatingDBResponse {
    pub id: RatingId,
    pub ride_id: RideId,
    pub user_id: UserId,
    pub captain_id: CaptainId,
    pub rating: i64,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a rating submission
#[derive(Debug, Clone)]
pub struct SubmittedRating {
    pub rating: RatingDBResponse,
    /// Captain's aggregate after this rating, rounded to one decimal
    pub captain_rating: f64,
    pub captain_rating_count: i64,
}
