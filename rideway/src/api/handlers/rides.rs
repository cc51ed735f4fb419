use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::rides::{CreateRideRequest, FareQuery, FareResponse, RideIdBody, RideIdQuery, RideResponse, StartRideQuery},
    auth::current_user::{CurrentCaptain, CurrentUser, Principal},
    errors::{Error, Result},
    rides::{lifecycle::Actor, service},
    types::RideId,
};

/// Fares for every vehicle type between two addresses
#[utoipa::path(
    get,
    path = "/ride/get-fare",
    tag = "rides",
    params(FareQuery),
    responses(
        (status = 200, description = "Fare quote", body = FareResponse),
        (status = 400, description = "Invalid addresses"),
        (status = 404, description = "Address or route not found"),
        (status = 502, description = "Maps provider unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_fare(State(state): State<AppState>, _current: CurrentUser, Query(query): Query<FareQuery>) -> Result<Json<FareResponse>> {
    let (pickup, destination) = query.validate()?;
    let (fare, route) = service::quote(&state, &pickup, &destination).await?;
    Ok(Json(FareResponse {
        fare,
        distance: route.distance,
        duration: route.duration,
    }))
}

/// Request a ride
#[utoipa::path(
    post,
    path = "/ride/create",
    request_body = CreateRideRequest,
    tag = "rides",
    responses(
        (status = 201, description = "Ride created", body = RideResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "The user already has an unfinished ride"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<RideResponse>)> {
    let new_ride = request.validate()?;
    let ride = service::create_ride(&state, &current.user, new_ride).await?;
    Ok((StatusCode::CREATED, Json(RideResponse::for_rider(ride))))
}

/// Cancel a ride as its rider
#[utoipa::path(
    get,
    path = "/ride/cancel",
    tag = "rides",
    params(RideIdQuery),
    responses(
        (status = 200, description = "Ride cancelled", body = RideResponse),
        (status = 404, description = "Ride not found"),
        (status = 409, description = "Ride can no longer be cancelled"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn cancel_as_user(State(state): State<AppState>, current: CurrentUser, Query(query): Query<RideIdQuery>) -> Result<Json<RideResponse>> {
    let ride_id = query.validate()?;
    let actor = Actor::User(current.user.id);
    service::cancel(&state, actor, ride_id).await?;
    Ok(Json(service::details(&state, actor, ride_id).await?))
}

/// Cancel a ride as its assigned captain
#[utoipa::path(
    post,
    path = "/ride/cancel",
    request_body = RideIdBody,
    tag = "rides",
    responses(
        (status = 200, description = "Ride cancelled", body = RideResponse),
        (status = 404, description = "Ride not found"),
        (status = 409, description = "Ride can no longer be cancelled"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn cancel_as_captain(
    State(state): State<AppState>,
    current: CurrentCaptain,
    Json(body): Json<RideIdBody>,
) -> Result<Json<RideResponse>> {
    let ride_id = body.validate()?;
    let actor = Actor::Captain(current.captain.id);
    service::cancel(&state, actor, ride_id).await?;
    Ok(Json(service::details(&state, actor, ride_id).await?))
}

/// Accept a pending ride
#[utoipa::path(
    post,
    path = "/ride/confirm",
    request_body = RideIdBody,
    tag = "rides",
    responses(
        (status = 200, description = "Ride confirmed", body = RideResponse),
        (status = 400, description = "Vehicle type does not match"),
        (status = 404, description = "Ride not found"),
        (status = 409, description = "Ride already confirmed, or the captain is busy"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn confirm(State(state): State<AppState>, current: CurrentCaptain, Json(body): Json<RideIdBody>) -> Result<Json<RideResponse>> {
    let ride_id = body.validate()?;
    service::confirm(&state, &current.captain, ride_id).await?;
    Ok(Json(service::details(&state, Actor::Captain(current.captain.id), ride_id).await?))
}

/// Start a confirmed ride with the rider's OTP
#[utoipa::path(
    get,
    path = "/ride/start-ride",
    tag = "rides",
    params(StartRideQuery),
    responses(
        (status = 200, description = "Ride started", body = RideResponse),
        (status = 400, description = "Invalid OTP"),
        (status = 404, description = "Ride not found"),
        (status = 409, description = "Ride is not confirmed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn start(State(state): State<AppState>, current: CurrentCaptain, Query(query): Query<StartRideQuery>) -> Result<Json<RideResponse>> {
    let (ride_id, otp) = query.validate(state.config.rides.otp_length)?;
    service::start(&state, &current.captain, ride_id, &otp).await?;
    Ok(Json(service::details(&state, Actor::Captain(current.captain.id), ride_id).await?))
}

/// Finish a started ride
#[utoipa::path(
    post,
    path = "/ride/end-ride",
    request_body = RideIdBody,
    tag = "rides",
    responses(
        (status = 200, description = "Ride completed", body = RideResponse),
        (status = 404, description = "Ride not found"),
        (status = 409, description = "Ride is not in progress"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn end(State(state): State<AppState>, current: CurrentCaptain, Json(body): Json<RideIdBody>) -> Result<Json<RideResponse>> {
    let ride_id = body.validate()?;
    service::end(&state, &current.captain, ride_id).await?;
    Ok(Json(service::details(&state, Actor::Captain(current.captain.id), ride_id).await?))
}

/// A ride, for its rider or assigned captain
#[utoipa::path(
    get,
    path = "/ride/{ride_id}",
    tag = "rides",
    params(("ride_id" = String, Path, description = "Ride ID")),
    responses(
        (status = 200, description = "Ride details", body = RideResponse),
        (status = 404, description = "Ride not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get(State(state): State<AppState>, principal: Principal, Path(ride_id): Path<String>) -> Result<Json<RideResponse>> {
    let ride_id: RideId = ride_id.parse().map_err(|_| Error::BadRequest {
        message: "Invalid ride id".to_string(),
    })?;
    Ok(Json(service::details(&state, principal.actor(), ride_id).await?))
}
