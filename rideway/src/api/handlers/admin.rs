use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        accounts::LoginRequest,
        admin::{AdminLoginResponse, CaptainBlockResponse, DashboardResponse, UserBlockResponse, block_message},
        captains::CaptainResponse,
        pagination::{PaginatedResponse, Pagination},
        rides::RideResponse,
        users::UserResponse,
    },
    auth::{
        current_user::AdminSession,
        session::{self, Role},
    },
    db::{
        handlers::{Analytics, Captains, Repository, Rides, Users, users::UserFilter},
        models::{
            captains::CaptainFilter,
            rides::{RideDBResponse, RideFilter},
        },
    },
    errors::{Error, Result},
};

/// Rides on the dashboard's recent list
const RECENT_RIDES: i64 = 5;

/// Days of earnings on the dashboard chart
const EARNINGS_DAYS: i64 = 7;

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse().map_err(|_| Error::BadRequest {
        message: format!("Invalid {what} id"),
    })
}

/// Attach user and captain summaries to each ride with two bulk lookups.
async fn with_participants(conn: &mut SqliteConnection, rides: Vec<RideDBResponse>) -> Result<Vec<RideResponse>> {
    let user_ids: HashSet<Uuid> = rides.iter().map(|r| r.user_id).collect();
    let captain_ids: HashSet<Uuid> = rides.iter().filter_map(|r| r.captain_id).collect();

    let users = Users::new(&mut *conn).get_bulk(user_ids.into_iter().collect()).await?;
    let captains = Captains::new(&mut *conn).get_bulk(captain_ids.into_iter().collect()).await?;

    Ok(rides
        .into_iter()
        .map(|ride| {
            let user = users.get(&ride.user_id).cloned();
            let captain = ride.captain_id.and_then(|id| captains.get(&id).cloned());
            let mut response = RideResponse::without_otp(ride);
            if let Some(user) = user {
                response = response.with_user(user);
            }
            if let Some(captain) = captain {
                response = response.with_captain(captain);
            }
            response
        })
        .collect())
}

/// Log in as the configured administrator
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    tag = "admin",
    responses(
        (status = 200, description = "Logged in", body = AdminLoginResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<AdminLoginResponse>> {
    request.validate()?;

    let invalid = || Error::Unauthenticated {
        message: Some("Invalid credentials".to_string()),
    };
    let admin = state.admin.as_ref().ok_or_else(invalid)?;
    if !admin.verify(&request.email, &request.password).await? {
        tracing::warn!("Failed admin login attempt");
        return Err(invalid());
    }

    let issued = session::create_session_token("admin", admin.email(), Role::Admin, &state.config)?;
    Ok(Json(AdminLoginResponse {
        message: "Login successful".to_string(),
        token: issued.token,
    }))
}

/// Headline numbers, recent rides and the earnings chart
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "admin",
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn dashboard(State(state): State<AppState>, _admin: AdminSession) -> Result<Json<DashboardResponse>> {
    let mut conn = state.db.acquire().await?;

    let mut analytics = Analytics::new(&mut conn);
    let counts = analytics.dashboard_counts().await?;
    let earnings = analytics.earnings_by_day(Utc::now(), EARNINGS_DAYS).await?;

    let recent = Rides::new(&mut conn).list(&RideFilter::new(0, RECENT_RIDES)).await?;
    let recent = with_participants(&mut conn, recent).await?;

    Ok(Json(DashboardResponse::new(counts, recent, earnings)))
}

/// Every rider, newest first
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    params(Pagination),
    responses(
        (status = 200, description = "Riders", body = PaginatedResponse<UserResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await?;
    let mut repo = Users::new(&mut conn);
    let users = repo.list(&UserFilter::new(skip, limit)).await?;
    let total = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Every captain, newest first
#[utoipa::path(
    get,
    path = "/admin/captains",
    tag = "admin",
    params(Pagination),
    responses(
        (status = 200, description = "Captains", body = PaginatedResponse<CaptainResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_captains(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<CaptainResponse>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await?;
    let mut repo = Captains::new(&mut conn);
    let captains = repo.list(&CaptainFilter::new(skip, limit)).await?;
    let total = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        captains.into_iter().map(CaptainResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Every ride, newest first, with rider and captain
#[utoipa::path(
    get,
    path = "/admin/rides",
    tag = "admin",
    params(Pagination),
    responses(
        (status = 200, description = "Rides", body = PaginatedResponse<RideResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_rides(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<RideResponse>>> {
    let (skip, limit) = pagination.params();
    let filter = RideFilter::new(skip, limit);

    let mut conn = state.db.acquire().await?;
    let rides = Rides::new(&mut conn).list(&filter).await?;
    let total = Rides::new(&mut conn).count(&filter).await?;
    let rides = with_participants(&mut conn, rides).await?;

    Ok(Json(PaginatedResponse::new(rides, total, skip, limit)))
}

/// One ride with rider and captain
#[utoipa::path(
    get,
    path = "/admin/rides/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Ride ID")),
    responses(
        (status = 200, description = "Ride", body = RideResponse),
        (status = 404, description = "Ride not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_ride(State(state): State<AppState>, _admin: AdminSession, Path(id): Path<String>) -> Result<Json<RideResponse>> {
    let id = parse_id(&id, "ride")?;
    let mut conn = state.db.acquire().await?;
    let ride = Rides::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::not_found("Ride"))?;

    let mut rides = with_participants(&mut conn, vec![ride]).await?;
    rides.pop().map(Json).ok_or_else(|| Error::not_found("Ride"))
}

/// Block or unblock a rider
#[utoipa::path(
    put,
    path = "/admin/users/{id}/toggle-block",
    tag = "admin",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Block state flipped", body = UserBlockResponse),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_user_block(State(state): State<AppState>, _admin: AdminSession, Path(id): Path<String>) -> Result<Json<UserBlockResponse>> {
    let id = parse_id(&id, "user")?;
    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn).toggle_block(id).await?.ok_or_else(|| Error::not_found("User"))?;

    tracing::info!("User {} is_blocked={}", id, user.is_blocked);
    Ok(Json(UserBlockResponse {
        message: block_message("User", user.is_blocked),
        user: UserResponse::from(user),
    }))
}

/// Block or unblock a captain
#[utoipa::path(
    put,
    path = "/admin/captains/{id}/toggle-block",
    tag = "admin",
    params(("id" = String, Path, description = "Captain ID")),
    responses(
        (status = 200, description = "Block state flipped", body = CaptainBlockResponse),
        (status = 404, description = "Captain not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_captain_block(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<CaptainBlockResponse>> {
    let id = parse_id(&id, "captain")?;
    let mut conn = state.db.acquire().await?;
    let captain = Captains::new(&mut conn)
        .toggle_block(id)
        .await?
        .ok_or_else(|| Error::not_found("Captain"))?;

    tracing::info!("Captain {} is_blocked={}", id, captain.is_blocked);
    Ok(Json(CaptainBlockResponse {
        message: block_message("Captain", captain.is_blocked),
        captain: CaptainResponse::from(captain),
    }))
}
