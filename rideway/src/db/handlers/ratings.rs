//! Database repository for ride ratings.

use crate::db::{
    errors::{DbError, Result},
    models::ratings::{RatingCreateDBRequest, RatingDBResponse, SubmittedRating},
};
use crate::types::{CaptainId, RideId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct Ratings<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Ratings<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Rate a completed ride and fold the score into the captain's running average.
    ///
    /// Fails with [`DbError::NotFound`] unless the ride belongs to `request.user_id` and is
    /// completed, and with a unique violation on `ratings.ride_id` if it was already rated.
    #[instrument(skip(self, request), fields(ride_id = %abbrev_uuid(&request.ride_id)), err)]
    pub async fn submit(&mut self, request: &RatingCreateDBRequest) -> Result<SubmittedRating> {
        let mut tx = self.db.begin().await?;

        let captain_id = sqlx::query_scalar::<_, Option<CaptainId>>(
            "SELECT captain_id FROM rides WHERE id = ? AND user_id = ? AND status = 'completed'",
        )
        .bind(request.ride_id)
        .bind(request.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .flatten();
        let captain_id = captain_id.ok_or(DbError::NotFound)?;

        let rating = sqlx::query_as::<_, RatingDBResponse>(
            r#"
            INSERT INTO ratings (id, ride_id, user_id, captain_id, rating, feedback, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.ride_id)
        .bind(request.user_id)
        .bind(captain_id)
        .bind(request.rating)
        .bind(&request.feedback)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        // Single statement so concurrent ratings for one captain cannot lose an update
        let (captain_rating, captain_rating_count): (f64, i64) = sqlx::query_as(
            r#"
            UPDATE captains SET
                rating = ROUND((rating * rating_count + ?) / (rating_count + 1), 1),
                rating_count = rating_count + 1,
                updated_at = ?
            WHERE id = ?
            RETURNING rating, rating_count
            "#,
        )
        .bind(request.rating as f64)
        .bind(Utc::now())
        .bind(captain_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SubmittedRating {
            rating,
            captain_rating,
            captain_rating_count,
        })
    }

    #[instrument(skip(self), fields(ride_id = %abbrev_uuid(&ride_id)), err)]
    pub async fn get_for_ride(&mut self, ride_id: RideId) -> Result<Option<RatingDBResponse>> {
        let rating = sqlx::query_as::<_, RatingDBResponse>("SELECT * FROM ratings WHERE ride_id = ?")
            .bind(ride_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(rating)
    }

    /// Mean score received by a captain in `[from, to)`, `None` if there were no ratings.
    #[instrument(skip(self), fields(captain_id = %abbrev_uuid(&captain_id)), err)]
    pub async fn average_for_captain_between(
        &mut self,
        captain_id: CaptainId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let average: Option<f64> =
            sqlx::query_scalar("SELECT AVG(rating) FROM ratings WHERE captain_id = ? AND created_at >= ? AND created_at < ?")
                .bind(captain_id)
                .bind(from)
                .bind(to)
                .fetch_one(&mut *self.db)
                .await?;

        Ok(average)
    }
}
