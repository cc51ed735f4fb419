use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::{
        handlers::accounts::{self, RESET_REQUESTED_MESSAGE},
        models::{
            accounts::{ForgotPasswordRequest, LoginRequest, MessageResponse, ResetPasswordRequest, WithCookie},
            captains::{
                CaptainAuthResponse, CaptainProfileResponse, CaptainRegister, CaptainResponse, CaptainStatsResponse, CaptainUpdate,
                CaptainUpdateResponse,
            },
            pagination::{PaginatedResponse, Pagination},
            rides::RideResponse,
        },
    },
    auth::{current_user::CurrentCaptain, password, session},
    db::{
        handlers::{Analytics, Captains, Repository, Rides},
        models::{
            captains::CaptainCreateDBRequest,
            rides::{RideFilter, RideParticipant},
        },
    },
    errors::{Error, Result},
    types::{AccountKind, abbrev_uuid},
};

fn invalid_credentials() -> Error {
    Error::NotFound {
        message: "Invalid email or password".to_string(),
    }
}

/// Register a captain and their vehicle
#[utoipa::path(
    post,
    path = "/captain/register",
    request_body = CaptainRegister,
    tag = "captains",
    responses(
        (status = 201, description = "Captain registered", body = CaptainAuthResponse),
        (status = 400, description = "Invalid input or email already registered"),
        (status = 409, description = "Vehicle plate already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<CaptainRegister>) -> Result<WithCookie<CaptainAuthResponse>> {
    let vehicle = request.validate(&state.config.auth.password)?;
    let email = accounts::normalize_email(&request.email);

    let mut conn = state.db.acquire().await?;
    if Captains::new(&mut conn).get_by_email(&email).await?.is_some() {
        return Err(Error::BadRequest {
            message: "Captain already exists".to_string(),
        });
    }

    let password_hash = accounts::hash_password(&state, &request.password).await?;
    let captain = Captains::new(&mut conn)
        .create(&CaptainCreateDBRequest {
            first_name: request.fullname.firstname.trim().to_string(),
            last_name: request
                .fullname
                .lastname
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            email,
            phone: request.phone.trim().to_string(),
            password_hash,
            vehicle,
        })
        .await?;

    let issued = accounts::issue_session(&state, AccountKind::Captain, captain.id, &captain.email)?;
    tracing::info!("Registered captain {} ({})", abbrev_uuid(&captain.id), captain.vehicle_type);

    Ok(WithCookie {
        status: StatusCode::CREATED,
        cookie: session::session_cookie(&issued.token, &state.config),
        body: CaptainAuthResponse {
            message: "Captain registered successfully".to_string(),
            token: issued.token,
            captain: CaptainResponse::from(captain),
        },
    })
}

/// Log in as a captain
#[utoipa::path(
    post,
    path = "/captain/login",
    request_body = LoginRequest,
    tag = "captains",
    responses(
        (status = 200, description = "Logged in", body = CaptainAuthResponse),
        (status = 403, description = "Account is blocked"),
        (status = 404, description = "Invalid email or password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<WithCookie<CaptainAuthResponse>> {
    request.validate()?;

    let mut conn = state.db.acquire().await?;
    let captain = Captains::new(&mut conn)
        .get_by_email(&accounts::normalize_email(&request.email))
        .await?
        .ok_or_else(invalid_credentials)?;

    if !password::verify_password(request.password, captain.password_hash.clone()).await? {
        return Err(invalid_credentials());
    }
    if captain.is_blocked {
        return Err(Error::Forbidden {
            message: "Account is blocked".to_string(),
        });
    }

    let issued = accounts::issue_session(&state, AccountKind::Captain, captain.id, &captain.email)?;
    Ok(WithCookie {
        status: StatusCode::OK,
        cookie: session::session_cookie(&issued.token, &state.config),
        body: CaptainAuthResponse {
            message: "Login successful".to_string(),
            token: issued.token,
            captain: CaptainResponse::from(captain),
        },
    })
}

/// The signed-in captain
#[utoipa::path(
    get,
    path = "/captain/profile",
    tag = "captains",
    responses(
        (status = 200, description = "Profile", body = CaptainProfileResponse),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn profile(current: CurrentCaptain) -> Json<CaptainProfileResponse> {
    Json(CaptainProfileResponse {
        captain: CaptainResponse::from(current.captain),
    })
}

/// Change name, phone or vehicle
#[utoipa::path(
    post,
    path = "/captain/update",
    request_body = CaptainUpdate,
    tag = "captains",
    responses(
        (status = 200, description = "Profile updated", body = CaptainUpdateResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Vehicle plate already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    current: CurrentCaptain,
    Json(request): Json<CaptainUpdate>,
) -> Result<Json<CaptainUpdateResponse>> {
    let update = request.into_db_request()?;

    let mut conn = state.db.acquire().await?;
    let captain = Captains::new(&mut conn).update(current.captain.id, &update).await?;

    Ok(Json(CaptainUpdateResponse {
        message: "Profile updated successfully".to_string(),
        captain: CaptainResponse::from(captain),
    }))
}

/// Revoke the presented session token
#[utoipa::path(
    get,
    path = "/captain/logout",
    tag = "captains",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, current: CurrentCaptain) -> Result<WithCookie<MessageResponse>> {
    accounts::revoke_token(&state, &current.token).await?;
    Ok(WithCookie {
        status: StatusCode::OK,
        cookie: session::clear_session_cookie(&state.config),
        body: MessageResponse::new("Logged out"),
    })
}

/// Today's numbers for the captain dashboard
#[utoipa::path(
    get,
    path = "/captain/stats",
    tag = "captains",
    responses(
        (status = 200, description = "Captain stats", body = CaptainStatsResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn stats(State(state): State<AppState>, current: CurrentCaptain) -> Result<Json<CaptainStatsResponse>> {
    let mut conn = state.db.acquire().await?;
    let stats = Analytics::new(&mut conn)
        .captain_stats(current.captain.id, current.captain.rating, Utc::now())
        .await?;
    Ok(Json(CaptainStatsResponse::from(stats)))
}

/// Email a password reset link
#[utoipa::path(
    post,
    path = "/captain/forgotpassword",
    request_body = ForgotPasswordRequest,
    tag = "captains",
    responses(
        (status = 200, description = "Reset requested", body = MessageResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forgot_password(State(state): State<AppState>, Json(request): Json<ForgotPasswordRequest>) -> Result<Json<MessageResponse>> {
    request.validate()?;
    accounts::request_password_reset(&state, AccountKind::Captain, &request.email).await?;
    Ok(Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)))
}

/// Set a new password from a reset link
#[utoipa::path(
    post,
    path = "/captain/resetpassword",
    request_body = ResetPasswordRequest,
    tag = "captains",
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired reset token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(State(state): State<AppState>, Json(request): Json<ResetPasswordRequest>) -> Result<Json<MessageResponse>> {
    accounts::reset_password(&state, AccountKind::Captain, &request).await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

/// Rides the captain has accepted, newest first
#[utoipa::path(
    get,
    path = "/captain/rides",
    tag = "captains",
    params(Pagination),
    responses(
        (status = 200, description = "Ride history", body = PaginatedResponse<RideResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn rides(
    State(state): State<AppState>,
    current: CurrentCaptain,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<RideResponse>>> {
    let (skip, limit) = pagination.params();
    let filter = RideFilter::new(skip, limit).participant(RideParticipant::Captain(current.captain.id));

    let mut conn = state.db.acquire().await?;
    let mut repo = Rides::new(&mut conn);
    let rides = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        rides.into_iter().map(RideResponse::without_otp).collect(),
        total,
        skip,
        limit,
    )))
}
