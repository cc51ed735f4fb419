//! Test utilities for integration testing (available with `test-utils` feature).

use std::sync::Arc;

use axum_test::TestServer;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{
        admin::AdminCredentials,
        password::{self, Argon2Params},
        session::{self, Role},
    },
    config::{
        AdminConfig, Config, DummyPaymentConfig, EmailConfig, EmailTransportConfig, MapsConfig, PasswordConfig, PaymentConfig,
        PoolSettings, StaticMapsConfig, StaticPlace,
    },
    db::{
        handlers::{Captains, Repository, Rides, Users},
        models::{
            captains::{CaptainCreateDBRequest, CaptainDBResponse, VehicleDetails},
            rides::{RideCreateDBRequest, RideDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    maps::fixed::FixedMaps,
    payment_providers::dummy::DummyProvider,
    realtime::Hub,
    types::VehicleType,
};

/// Secret the dummy payment provider signs with in tests
pub const TEST_PAYMENT_SECRET: &str = "test-payment-secret";

pub const TEST_ADMIN_EMAIL: &str = "admin@rideway.test";
pub const TEST_ADMIN_PASSWORD: &str = "admin-password";

/// Password of every account made by [`create_test_user`] and [`create_test_captain`]
pub const TEST_ACCOUNT_PASSWORD: &str = "password123";

pub fn install_crypto_provider() {
    // Fails when another test already installed it
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let email_dir = std::env::temp_dir().join(format!("rideway-test-emails-{}", std::process::id()));

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        frontend_url: "http://localhost:5173".to_string(),
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        database: crate::config::DatabaseConfig {
            // sqlx::test hands out its own pool
            url: "sqlite::memory:".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                ..Default::default()
            },
        },
        admin: AdminConfig {
            email: Some(TEST_ADMIN_EMAIL.to_string()),
            password: Some(TEST_ADMIN_PASSWORD.to_string()),
        },
        auth: crate::config::AuthConfig {
            password: PasswordConfig {
                // Fast hashing for tests
                argon2_memory_kib: 1024,
                argon2_iterations: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: email_dir.to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        payment: PaymentConfig::Dummy(DummyPaymentConfig {
            key_secret: TEST_PAYMENT_SECRET.to_string(),
        }),
        maps: MapsConfig::Static(StaticMapsConfig {
            places: vec![
                StaticPlace {
                    name: "MG Road".to_string(),
                    ltd: 12.9756,
                    lng: 77.6050,
                },
                StaticPlace {
                    name: "Indiranagar".to_string(),
                    ltd: 12.9784,
                    lng: 77.6408,
                },
                StaticPlace {
                    name: "Koramangala".to_string(),
                    ltd: 12.9352,
                    lng: 77.6245,
                },
            ],
            average_speed_kmh: 30.0,
        }),
        rides: crate::config::RidesConfig {
            captain_search_radius_km: 5.0,
            currency: "INR".to_string(),
            ..Default::default()
        },
        background_services: crate::config::BackgroundServicesConfig {
            token_cleanup: crate::config::TokenCleanupConfig {
                enabled: false,
                ..Default::default()
            },
        },
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    }
}

/// State over `pool` with offline providers and no admin account.
pub fn create_test_state(pool: SqlitePool) -> AppState {
    let config = create_test_config();
    let MapsConfig::Static(maps) = &config.maps else {
        unreachable!("test config uses static maps")
    };
    let PaymentConfig::Dummy(payment) = &config.payment else {
        unreachable!("test config uses the dummy provider")
    };

    AppState::builder()
        .db(pool)
        .maps(Arc::new(FixedMaps::new(maps)))
        .payments(Arc::new(DummyProvider::from(payment.clone())))
        .hub(Hub::new())
        .config(config)
        .build()
}

/// Router over `pool` with the test admin configured. Served over a real socket so WebSocket
/// upgrades work.
pub async fn create_test_server(pool: SqlitePool) -> (TestServer, AppState) {
    install_crypto_provider();
    let mut state = create_test_state(pool);
    state.admin = AdminCredentials::from_config(&state.config)
        .await
        .expect("Failed to hash admin password")
        .map(Arc::new);

    let router = crate::build_router(&state).expect("Failed to build router");
    let server = TestServer::builder()
        .http_transport()
        .build(router)
        .expect("Failed to create test server");
    (server, state)
}

fn test_password_hash() -> String {
    password::hash_string(TEST_ACCOUNT_PASSWORD, Argon2Params::from(&create_test_config().auth.password)).expect("Failed to hash password")
}

pub async fn create_test_user(pool: &SqlitePool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple().to_string();

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            first_name: "Test".to_string(),
            last_name: Some("Rider".to_string()),
            email: format!("rider_{suffix}@example.com"),
            phone: None,
            password_hash: test_password_hash(),
        })
        .await
        .expect("Failed to create test user")
}

/// A captain with a unique plate, not yet online and with no known location.
pub async fn create_test_captain(pool: &SqlitePool, vehicle_type: VehicleType) -> CaptainDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple().to_string();

    Captains::new(&mut conn)
        .create(&CaptainCreateDBRequest {
            first_name: "Test".to_string(),
            last_name: Some("Captain".to_string()),
            email: format!("captain_{suffix}@example.com"),
            phone: "9876543210".to_string(),
            password_hash: test_password_hash(),
            vehicle: VehicleDetails {
                color: "White".to_string(),
                plate: format!("KA01{}", &suffix[..8]).to_uppercase(),
                capacity: match vehicle_type {
                    VehicleType::Bike => 1,
                    VehicleType::Auto => 3,
                    VehicleType::Car => 4,
                },
                vehicle_type,
            },
        })
        .await
        .expect("Failed to create test captain")
}

/// A pending ride from MG Road to Indiranagar.
pub async fn create_test_ride(pool: &SqlitePool, user_id: Uuid, vehicle_type: VehicleType) -> RideDBResponse {
    let config = create_test_config();
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    Rides::new(&mut conn)
        .create(&RideCreateDBRequest {
            user_id,
            pickup: "MG Road".to_string(),
            destination: "Indiranagar".to_string(),
            pickup_latitude: Some(12.9756),
            pickup_longitude: Some(77.6050),
            vehicle_type,
            fare: 120,
            distance_meters: Some(3_900),
            duration_seconds: Some(470),
            otp: password::generate_otp(config.rides.otp_length),
        })
        .await
        .expect("Failed to create test ride")
}

pub fn token_for_user(user: &UserDBResponse, config: &Config) -> String {
    session::create_session_token(user.id.to_string(), &user.email, Role::User, config)
        .expect("Failed to create session token")
        .token
}

pub fn token_for_captain(captain: &CaptainDBResponse, config: &Config) -> String {
    session::create_session_token(captain.id.to_string(), &captain.email, Role::Captain, config)
        .expect("Failed to create session token")
        .token
}
