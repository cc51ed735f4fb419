use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::ratings::{RatingRequest, RatingSubmission, RatingSubmittedResponse},
    auth::current_user::CurrentUser,
    db::{
        errors::DbError,
        handlers::Ratings,
        models::{ratings::RatingCreateDBRequest, users::UserDBResponse},
    },
    errors::{Error, Result},
    types::{RideId, abbrev_uuid},
};

/// Rate a completed ride on behalf of `user`.
#[tracing::instrument(skip_all, fields(ride_id = %abbrev_uuid(&submission.ride_id)), err)]
async fn submit_rating(state: &AppState, user: &UserDBResponse, submission: RatingSubmission) -> Result<RatingSubmittedResponse> {
    let mut conn = state.db.acquire().await?;
    let submitted = Ratings::new(&mut conn)
        .submit(&RatingCreateDBRequest {
            ride_id: submission.ride_id,
            user_id: user.id,
            rating: submission.rating,
            feedback: submission.feedback,
        })
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                message: "Ride not found or not completed".to_string(),
            },
            DbError::UniqueViolation { .. } => Error::BadRequest {
                message: "Rating already submitted".to_string(),
            },
            other => Error::Database(other),
        })?;

    metrics::counter!("rideway_ratings_submitted_total").increment(1);
    tracing::info!(
        "Captain {} rated {} ({} ratings, average {})",
        abbrev_uuid(&submitted.rating.captain_id),
        submitted.rating.rating,
        submitted.captain_rating_count,
        submitted.captain_rating
    );

    Ok(RatingSubmittedResponse {
        message: "Rating submitted successfully".to_string(),
        captain_rating: submitted.captain_rating,
    })
}

/// Rate a completed ride
#[utoipa::path(
    post,
    path = "/rating/submit",
    request_body = RatingRequest,
    tag = "ratings",
    responses(
        (status = 200, description = "Rating recorded", body = RatingSubmittedResponse),
        (status = 400, description = "Invalid rating, or the ride was already rated"),
        (status = 404, description = "Ride not found or not completed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn submit(State(state): State<AppState>, current: CurrentUser, Json(request): Json<RatingRequest>) -> Result<Json<RatingSubmittedResponse>> {
    let submission = request.validate()?;
    Ok(Json(submit_rating(&state, &current.user, submission).await?))
}

/// Rate a completed ride from the ride history
#[utoipa::path(
    post,
    path = "/user/rides/rate",
    request_body = RatingRequest,
    tag = "ratings",
    responses(
        (status = 200, description = "Rating recorded", body = RatingSubmittedResponse),
        (status = 400, description = "Invalid rating, or the ride was already rated"),
        (status = 404, description = "Ride not found or not completed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn rate_ride(State(state): State<AppState>, current: CurrentUser, Json(request): Json<RatingRequest>) -> Result<Json<RatingSubmittedResponse>> {
    let submission = request.validate()?;
    Ok(Json(submit_rating(&state, &current.user, submission).await?))
}

/// Rate the ride named in the path
#[utoipa::path(
    post,
    path = "/user/rides/{ride_id}/rate",
    request_body = RatingRequest,
    tag = "ratings",
    params(("ride_id" = String, Path, description = "Ride ID")),
    responses(
        (status = 200, description = "Rating recorded", body = RatingSubmittedResponse),
        (status = 400, description = "Invalid rating, or the ride was already rated"),
        (status = 404, description = "Ride not found or not completed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn rate_ride_by_id(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(ride_id): Path<String>,
    Json(request): Json<RatingRequest>,
) -> Result<Json<RatingSubmittedResponse>> {
    let ride_id: RideId = ride_id.parse().map_err(|_| Error::BadRequest {
        message: "Invalid ride id".to_string(),
    })?;
    let submission = request.validate_for(ride_id)?;
    Ok(Json(submit_rating(&state, &current.user, submission).await?))
}
