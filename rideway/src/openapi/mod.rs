//! OpenAPI documentation for the HTTP API, rendered with Scalar at `/docs`.
//!
//! Realtime events travel over `/ws` and are not described here beyond the upgrade itself; see
//! [`crate::realtime::messages`] for the frame types.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, maps, payment_providers, realtime, rides, types};

/// Session token as a bearer header, the `token` cookie, or a bare `token` header.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Session token returned by login or registration"))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("token"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rideway API",
        description = "Ride-hailing backend: riders book rides, captains accept and drive them, administrators oversee both."
    ),
    modifiers(&SecurityAddon),
    security(("BearerAuth" = []), ("CookieAuth" = [])),
    paths(
        api::handlers::users::register,
        api::handlers::users::login,
        api::handlers::users::profile,
        api::handlers::users::update,
        api::handlers::users::logout,
        api::handlers::users::forgot_password,
        api::handlers::users::reset_password,
        api::handlers::users::rides,
        api::handlers::captains::register,
        api::handlers::captains::login,
        api::handlers::captains::profile,
        api::handlers::captains::update,
        api::handlers::captains::logout,
        api::handlers::captains::stats,
        api::handlers::captains::forgot_password,
        api::handlers::captains::reset_password,
        api::handlers::captains::rides,
        api::handlers::rides::get_fare,
        api::handlers::rides::create,
        api::handlers::rides::cancel_as_user,
        api::handlers::rides::cancel_as_captain,
        api::handlers::rides::confirm,
        api::handlers::rides::start,
        api::handlers::rides::end,
        api::handlers::rides::get,
        api::handlers::maps::get_coordinates,
        api::handlers::maps::get_distance_time,
        api::handlers::maps::get_suggestions,
        api::handlers::ratings::submit,
        api::handlers::ratings::rate_ride,
        api::handlers::ratings::rate_ride_by_id,
        api::handlers::payments::create_order,
        api::handlers::payments::verify_order,
        api::handlers::admin::login,
        api::handlers::admin::dashboard,
        api::handlers::admin::list_users,
        api::handlers::admin::list_captains,
        api::handlers::admin::list_rides,
        api::handlers::admin::get_ride,
        api::handlers::admin::toggle_user_block,
        api::handlers::admin::toggle_captain_block,
        api::handlers::socket::connect,
    ),
    components(
        schemas(
            types::AccountKind,
            types::VehicleType,
            rides::lifecycle::RideStatus,
            rides::lifecycle::PaymentStatus,
            maps::Coordinates,
            maps::DistanceTime,
            payment_providers::Order,
            api::models::accounts::MessageResponse,
            api::models::rides::RideResponse,
            api::models::users::UserResponse,
            api::models::captains::CaptainResponse,
            realtime::messages::PaymentRequiredPayload,
            realtime::messages::PaymentSuccessPayload,
            realtime::messages::ChatMessage,
            realtime::messages::ErrorPayload,
        )
    ),
    tags(
        (name = "users", description = "Rider accounts and ride history"),
        (name = "captains", description = "Captain accounts, stats and ride history"),
        (name = "rides", description = "Fares, booking and the ride lifecycle"),
        (name = "maps", description = "Geocoding, routes and suggestions"),
        (name = "ratings", description = "Rating completed rides"),
        (name = "payments", description = "Checkout orders and verification"),
        (name = "admin", description = "Administrator dashboard and account management"),
        (name = "realtime", description = "WebSocket channel for ride events and chat"),
    )
)]
pub struct ApiDoc;
