use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::accounts::{self, RESET_REQUESTED_MESSAGE},
        models::{
            accounts::{ForgotPasswordRequest, LoginRequest, MessageResponse, ResetPasswordRequest, WithCookie},
            pagination::{PaginatedResponse, Pagination},
            rides::RideResponse,
            users::{UserAuthResponse, UserProfileResponse, UserRegister, UserResponse, UserUpdate, UserUpdateResponse},
        },
    },
    auth::{current_user::CurrentUser, password, session},
    db::{
        handlers::{Repository, Rides, Users},
        models::{
            rides::{RideFilter, RideParticipant},
            users::UserCreateDBRequest,
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

/// Register a rider account
#[utoipa::path(
    post,
    path = "/user/register",
    request_body = UserRegister,
    tag = "users",
    responses(
        (status = 201, description = "User registered", body = UserAuthResponse),
        (status = 400, description = "Invalid input or email already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<UserRegister>) -> Result<WithCookie<UserAuthResponse>> {
    request.validate(&state.config.auth.password)?;
    let email = accounts::normalize_email(&request.email);

    let mut conn = state.db.acquire().await?;
    if Users::new(&mut conn).get_by_email(&email).await?.is_some() {
        return Err(Error::BadRequest {
            message: "User already exists".to_string(),
        });
    }

    let password_hash = accounts::hash_password(&state, &request.password).await?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            first_name: request.fullname.firstname.trim().to_string(),
            last_name: request
                .fullname
                .lastname
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            email,
            phone: request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()).map(str::to_string),
            password_hash,
        })
        .await?;

    let issued = accounts::issue_session(&state, AccountKind::User, user.id, &user.email)?;
    tracing::info!("Registered user {}", abbrev_uuid(&user.id));

    Ok(WithCookie {
        status: StatusCode::CREATED,
        cookie: session::session_cookie(&issued.token, &state.config),
        body: UserAuthResponse {
            message: "User registered successfully".to_string(),
            token: issued.token,
            user: UserResponse::from(user),
        },
    })
}

/// Log in as a rider
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    tag = "users",
    responses(
        (status = 200, description = "Logged in", body = UserAuthResponse),
        (status = 403, description = "Account is blocked"),
        (status = 404, description = "Invalid email or password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<WithCookie<UserAuthResponse>> {
    request.validate()?;

    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn)
        .get_by_email(&accounts::normalize_email(&request.email))
        .await?
        .ok_or_else(invalid_credentials)?;

    if !password::verify_password(request.password, user.password_hash.clone()).await? {
        return Err(invalid_credentials());
    }
    if user.is_blocked {
        return Err(Error::Forbidden {
            message: "Account is blocked".to_string(),
        });
    }

    let issued = accounts::issue_session(&state, AccountKind::User, user.id, &user.email)?;
    Ok(WithCookie {
        status: StatusCode::OK,
        cookie: session::session_cookie(&issued.token, &state.config),
        body: UserAuthResponse {
            message: "Login successful".to_string(),
            token: issued.token,
            user: UserResponse::from(user),
        },
    })
}

/// The signed-in rider
#[utoipa::path(
    get,
    path = "/user/profile",
    tag = "users",
    responses(
        (status = 200, description = "Profile", body = UserProfileResponse),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn profile(current: CurrentUser) -> Json<UserProfileResponse> {
    Json(UserProfileResponse {
        user: UserResponse::from(current.user),
    })
}

/// Change name or phone
#[utoipa::path(
    post,
    path = "/user/update",
    request_body = UserUpdate,
    tag = "users",
    responses(
        (status = 200, description = "Profile updated", body = UserUpdateResponse),
        (status = 400, description = "Invalid input"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update(State(state): State<AppState>, current: CurrentUser, Json(request): Json<UserUpdate>) -> Result<Json<UserUpdateResponse>> {
    request.validate()?;

    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn).update(current.user.id, &request.into_db_request()).await?;

    Ok(Json(UserUpdateResponse {
        message: "Profile updated successfully".to_string(),
        user: UserResponse::from(user),
    }))
}

/// Revoke the presented session token
#[utoipa::path(
    get,
    path = "/user/logout",
    tag = "users",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> Result<WithCookie<MessageResponse>> {
    accounts::revoke_token(&state, &current.token).await?;
    Ok(WithCookie {
        status: StatusCode::OK,
        cookie: session::clear_session_cookie(&state.config),
        body: MessageResponse::new("Logged out"),
    })
}

/// Email a password reset link
#[utoipa::path(
    post,
    path = "/user/forgotpassword",
    request_body = ForgotPasswordRequest,
    tag = "users",
    responses(
        (status = 200, description = "Reset requested", body = MessageResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forgot_password(State(state): State<AppState>, Json(request): Json<ForgotPasswordRequest>) -> Result<Json<MessageResponse>> {
    request.validate()?;
    accounts::request_password_reset(&state, AccountKind::User, &request.email).await?;
    Ok(Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)))
}

/// Set a new password from a reset link
#[utoipa::path(
    post,
    path = "/user/resetpassword",
    request_body = ResetPasswordRequest,
    tag = "users",
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired reset token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(State(state): State<AppState>, Json(request): Json<ResetPasswordRequest>) -> Result<Json<MessageResponse>> {
    accounts::reset_password(&state, AccountKind::User, &request).await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

/// The rider's rides, newest first
#[utoipa::path(
    get,
    path = "/user/rides",
    tag = "users",
    params(Pagination),
    responses(
        (status = 200, description = "Ride history", body = PaginatedResponse<RideResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn rides(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<RideResponse>>> {
    let (skip, limit) = pagination.params();
    let filter = RideFilter::new(skip, limit).participant(RideParticipant::User(current.user.id));

    let mut conn = state.db.acquire().await?;
    let mut repo = Rides::new(&mut conn);
    let rides = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        rides.into_iter().map(RideResponse::for_rider).collect(),
        total,
        skip,
        limit,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_server, create_test_user, token_for_user};
    use serde_json::json;
    use sqlx::SqlitePool;

    fn register_body(email: &str) -> serde_json::Value {
        json!({
            "fullname": {"firstname": "Asha", "lastname": "Rao"},
            "email": email,
            "password": "password123"
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_and_login(pool: SqlitePool) {
        let (server, _state) = create_test_server(pool).await;

        let response = server.post("/user/register").json(&register_body("Asha@Example.com")).await;
        response.assert_status(StatusCode::CREATED);
        assert!(response.headers().get("set-cookie").is_some());
        let body: UserAuthResponse = response.json();
        assert_eq!(body.user.email, "asha@example.com");
        assert!(!body.token.is_empty());

        let duplicate = server.post("/user/register").json(&register_body("asha@example.com")).await;
        duplicate.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(duplicate.json::<serde_json::Value>()["message"], "User already exists");

        let login = server
            .post("/user/login")
            .json(&json!({"email": "asha@example.com", "password": "password123"}))
            .await;
        login.assert_status_ok();
        let body: UserAuthResponse = login.json();
        assert_eq!(body.user.fullname.firstname, "Asha");

        let wrong = server
            .post("/user/login")
            .json(&json!({"email": "asha@example.com", "password": "not-the-password"}))
            .await;
        wrong.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(wrong.json::<serde_json::Value>()["message"], "Invalid email or password");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_validation_errors(pool: SqlitePool) {
        let (server, _state) = create_test_server(pool).await;

        let response = server
            .post("/user/register")
            .json(&json!({"fullname": {"firstname": "A"}, "email": "nope", "password": "short"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);
        assert_eq!(body["errors"][0]["path"], "email");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_profile_requires_token(pool: SqlitePool) {
        let (server, state) = create_test_server(pool.clone()).await;
        server.get("/user/profile").await.assert_status(StatusCode::UNAUTHORIZED);

        let user = create_test_user(&pool).await;
        let token = token_for_user(&user, &state.config);

        // Query-string tokens are only for the socket upgrade
        server
            .get("/user/profile")
            .add_query_param("token", &token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server.get("/user/profile").authorization_bearer(&token).await;
        response.assert_status_ok();
        let body: UserProfileResponse = response.json();
        assert_eq!(body.user.id, user.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_logout_revokes_token(pool: SqlitePool) {
        let (server, state) = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool).await;
        let token = token_for_user(&user, &state.config);

        let response = server.get("/user/logout").add_header("token", &token).await;
        response.assert_status_ok();
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(cookie.contains("Max-Age=0"));

        server
            .get("/user/profile")
            .add_header("token", &token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_profile(pool: SqlitePool) {
        let (server, state) = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool).await;
        let token = token_for_user(&user, &state.config);

        let response = server
            .post("/user/update")
            .authorization_bearer(&token)
            .json(&json!({"userData": {"fullname": {"firstname": "Meera"}, "phone": "9876543210"}}))
            .await;
        response.assert_status_ok();
        let body: UserUpdateResponse = response.json();
        assert_eq!(body.user.fullname.firstname, "Meera");
        assert_eq!(body.user.phone.as_deref(), Some("9876543210"));

        server
            .post("/user/update")
            .authorization_bearer(&token)
            .json(&json!({"userData": {"fullname": {"lastname": "R"}}}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_forgot_password_is_uniform(pool: SqlitePool) {
        let (server, _state) = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool).await;

        let known = server.post("/user/forgotpassword").json(&json!({"email": user.email})).await;
        let unknown = server
            .post("/user/forgotpassword")
            .json(&json!({"email": "nobody@example.com"}))
            .await;
        known.assert_status_ok();
        unknown.assert_status_ok();
        assert_eq!(known.json::<MessageResponse>().message, RESET_REQUESTED_MESSAGE);
        assert_eq!(unknown.json::<MessageResponse>().message, RESET_REQUESTED_MESSAGE);
    }
}
