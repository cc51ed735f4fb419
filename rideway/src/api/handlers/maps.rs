use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::maps::{AddressQuery, DistanceTimeQuery, SuggestionsQuery},
    auth::current_user::Principal,
    errors::Result,
    maps::{Coordinates, DistanceTime},
};

/// Resolve an address to coordinates
#[utoipa::path(
    get,
    path = "/map/get-coordinates",
    tag = "maps",
    params(AddressQuery),
    responses(
        (status = 200, description = "Best match", body = Coordinates),
        (status = 400, description = "Invalid address"),
        (status = 404, description = "Location not found"),
        (status = 502, description = "Maps provider unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_coordinates(State(state): State<AppState>, _principal: Principal, Query(query): Query<AddressQuery>) -> Result<Json<Coordinates>> {
    let address = query.validate()?;
    Ok(Json(state.maps.geocode(address).await?))
}

/// Driving distance and duration between two places
#[utoipa::path(
    get,
    path = "/map/get-distance-time",
    tag = "maps",
    params(DistanceTimeQuery),
    responses(
        (status = 200, description = "Route summary", body = DistanceTime),
        (status = 400, description = "Invalid origin or destination"),
        (status = 404, description = "Location or route not found"),
        (status = 502, description = "Maps provider unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_distance_time(
    State(state): State<AppState>,
    _principal: Principal,
    Query(query): Query<DistanceTimeQuery>,
) -> Result<Json<DistanceTime>> {
    let (origin, destination) = query.validate()?;
    Ok(Json(state.maps.distance_time(origin, destination).await?))
}

/// Autocomplete place names
#[utoipa::path(
    get,
    path = "/map/get-suggestions",
    tag = "maps",
    params(SuggestionsQuery),
    responses(
        (status = 200, description = "Matching place names", body = Vec<String>),
        (status = 400, description = "Input is required"),
        (status = 502, description = "Maps provider unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_suggestions(State(state): State<AppState>, _principal: Principal, Query(query): Query<SuggestionsQuery>) -> Result<Json<Vec<String>>> {
    let input = query.validate()?;
    Ok(Json(state.maps.suggestions(input).await?))
}
