//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `RIDEWAY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `RIDEWAY_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `RIDEWAY_RIDES__CAPTAIN_SEARCH_RADIUS_KM=5` sets the `rides.captain_search_radius_km` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use rideway::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! See the repository's `config.yaml` for a complete example. Key sections include:
//!
//! - **Server**: `host`, `port`
//! - **Database**: `database.url`, `database.pool` - SQLite connection settings
//! - **Admin**: `admin.email`, `admin.password` - Credentials for the admin dashboard
//! - **Authentication**: `auth.password`, `auth.session`, `auth.cors`
//! - **Providers**: `payment`, `maps`, `email`
//! - **Rides**: `rides.fares`, `rides.captain_search_radius_km`, `rides.otp_length`
//! - **Realtime**: `realtime.ping_interval`, `realtime.client_timeout`
//! - **Background Services**: `background_services.token_cleanup`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! RIDEWAY_PORT=8080
//! DATABASE_URL="sqlite:///var/lib/rideway/rideway.db?mode=rwc"
//! RIDEWAY_SECRET_KEY="change-me"
//! RIDEWAY_PAYMENT__RAZORPAY__KEY_SECRET="..."
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "RIDEWAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base URL of the rider/captain web client. Used for password reset links.
    pub frontend_url: String,
    /// Shortcut for `database.url`, populated from `DATABASE_URL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Secret key for JWT signing (required)
    pub secret_key: Option<String>,
    /// Admin dashboard credentials
    pub admin: AdminConfig,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Email configuration for password resets
    pub email: EmailConfig,
    /// Payment provider configuration
    pub payment: PaymentConfig,
    /// Geocoding and routing provider configuration
    pub maps: MapsConfig,
    /// Ride matching and pricing
    pub rides: RidesConfig,
    /// WebSocket session settings
    pub realtime: RealtimeConfig,
    /// Background services configuration
    pub background_services: BackgroundServicesConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// SQLite database settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string, e.g. `sqlite://rideway.db?mode=rwc`
    pub url: String,
    /// Connection pool settings
    pub pool: PoolSettings,
}

/// Individual pool configuration with all SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://rideway.db?mode=rwc".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Admin dashboard credentials.
///
/// The password is hashed once at startup; the plain value never leaves the config.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Password validation and hashing rules
    pub password: PasswordConfig,
    /// User and captain session settings
    pub session: SessionConfig,
    /// Lifetime of admin tokens
    #[serde(with = "humantime_serde")]
    pub admin_session_expiry: Duration,
    /// Lifetime of password reset links
    #[serde(with = "humantime_serde")]
    pub password_reset_token_duration: Duration,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: PasswordConfig::default(),
            session: SessionConfig::default(),
            admin_session_expiry: Duration::from_secs(24 * 60 * 60),
            password_reset_token_duration: Duration::from_secs(30 * 60),
            cors: CorsConfig::default(),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Session timeout duration, also the JWT expiry
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
            cookie_name: "token".to_string(),
            cookie_secure: true,
            cookie_same_site: "lax".to_string(),
        }
    }
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB, secure for production)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2, secure for production)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 64,
            // Secure defaults for production (Argon2id RFC recommendations)
            argon2_memory_kib: 19456, // 19 MB
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            // Development frontend (Vite)
            allowed_origins: Url::parse("http://localhost:5173").ok().map(CorsOrigin::Url).into_iter().collect(),
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

/// Email configuration for password resets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// Who to set the reply to field from
    pub reply_to: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::default(),
            from_email: "noreply@rideway.local".to_string(),
            from_name: "Rideway".to_string(),
            reply_to: None,
        }
    }
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: String,
        /// Use STARTTLS
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

impl Default for EmailTransportConfig {
    fn default() -> Self {
        Self::File {
            path: "./emails".to_string(),
        }
    }
}

/// Payment provider configuration.
///
/// Credentials should be set via environment variables, e.g.
/// `RIDEWAY_PAYMENT__RAZORPAY__KEY_SECRET`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentConfig {
    /// Razorpay orders API
    Razorpay(RazorpayConfig),
    /// Local provider for development and tests
    Dummy(DummyPaymentConfig),
}

impl Default for PaymentConfig {
    fn default() -> Self {
        PaymentConfig::Dummy(DummyPaymentConfig::default())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RazorpayConfig {
    /// Public key id (rzp_...)
    pub key_id: String,
    /// Secret used for basic auth and signature verification
    pub key_secret: String,
    /// Base URL of the orders API
    #[serde(default = "RazorpayConfig::default_api_url")]
    pub api_url: String,
}

impl RazorpayConfig {
    fn default_api_url() -> String {
        "https://api.razorpay.com/v1/".to_string()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummyPaymentConfig {
    /// Secret used to sign and verify dummy payments
    pub key_secret: String,
}

impl Default for DummyPaymentConfig {
    fn default() -> Self {
        Self {
            key_secret: "dummy_secret".to_string(),
        }
    }
}

/// Geocoding and routing provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapsConfig {
    /// Nominatim geocoding plus OSRM routing
    OpenStreetMap(OpenStreetMapConfig),
    /// Fixed gazetteer, no network access
    Static(StaticMapsConfig),
}

impl Default for MapsConfig {
    fn default() -> Self {
        MapsConfig::OpenStreetMap(OpenStreetMapConfig::default())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenStreetMapConfig {
    pub nominatim_url: String,
    pub osrm_url: String,
    /// Nominatim's usage policy requires an identifying User-Agent
    pub user_agent: String,
    /// Minimum spacing between Nominatim requests
    #[serde(with = "humantime_serde")]
    pub min_request_interval: Duration,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OpenStreetMapConfig {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org/".to_string(),
            osrm_url: "https://router.project-osrm.org/".to_string(),
            user_agent: concat!("rideway/", env!("CARGO_PKG_VERSION")).to_string(),
            min_request_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticMapsConfig {
    /// Known places, matched case-insensitively by name
    pub places: Vec<StaticPlace>,
    /// Used to derive travel time from great-circle distance
    pub average_speed_kmh: f64,
}

impl Default for StaticMapsConfig {
    fn default() -> Self {
        Self {
            places: Vec::new(),
            average_speed_kmh: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StaticPlace {
    pub name: String,
    pub ltd: f64,
    pub lng: f64,
}

/// Ride matching and pricing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RidesConfig {
    /// Captains further than this from the pickup are not notified
    pub captain_search_radius_km: f64,
    /// Number of digits in the ride start OTP
    pub otp_length: usize,
    /// ISO currency code for fares and payments
    pub currency: String,
    pub fares: FaresConfig,
}

impl Default for RidesConfig {
    fn default() -> Self {
        Self {
            captain_search_radius_km: 2.0,
            otp_length: 6,
            currency: "INR".to_string(),
            fares: FaresConfig::default(),
        }
    }
}

/// Per vehicle type fare rates.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaresConfig {
    pub auto: FareRate,
    pub car: FareRate,
    pub bike: FareRate,
}

impl Default for FaresConfig {
    fn default() -> Self {
        Self {
            auto: FareRate::new(30.0, 10.0, 2.0),
            car: FareRate::new(50.0, 15.0, 3.0),
            bike: FareRate::new(20.0, 8.0, 1.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FareRate {
    pub base: f64,
    pub per_km: f64,
    pub per_minute: f64,
}

impl FareRate {
    pub fn new(base: f64, per_km: f64, per_minute: f64) -> Self {
        Self { base, per_km, per_minute }
    }
}

/// WebSocket session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealtimeConfig {
    #[serde(with = "humantime_serde")]
    pub ping_interval: Duration,
    /// Connections with no inbound frame for this long are closed
    #[serde(with = "humantime_serde")]
    pub client_timeout: Duration,
    /// Outbound queue depth per connection
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(25),
            client_timeout: Duration::from_secs(60),
            channel_capacity: 64,
        }
    }
}

/// Background services configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundServicesConfig {
    pub token_cleanup: TokenCleanupConfig,
}

/// Purges expired blacklist entries and spent reset tokens.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenCleanupConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for TokenCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60 * 60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            frontend_url: "http://localhost:5173".to_string(),
            database_url: None,
            database: DatabaseConfig::default(),
            secret_key: None,
            admin: AdminConfig::default(),
            auth: AuthConfig::default(),
            email: EmailConfig::default(),
            payment: PaymentConfig::default(),
            maps: MapsConfig::default(),
            rides: RidesConfig::default(),
            realtime: RealtimeConfig::default(),
            background_services: BackgroundServicesConfig::default(),
            enable_metrics: true,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it (preserving existing pool settings)
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Internal {
                operation: "Config validation: secret_key is not configured. \
                     Please set RIDEWAY_SECRET_KEY environment variable or add secret_key to config file."
                    .to_string(),
            });
        }

        let password = &self.auth.password;
        if password.min_length > password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    password.min_length, password.max_length
                ),
            });
        }

        if password.min_length < 1 {
            return Err(Error::Internal {
                operation: "Config validation: Invalid password configuration: min_length must be at least 1".to_string(),
            });
        }

        for (name, expiry) in [
            ("auth.session.timeout", self.auth.session.timeout),
            ("auth.admin_session_expiry", self.auth.admin_session_expiry),
        ] {
            if expiry.as_secs() < 300 {
                return Err(Error::Internal {
                    operation: format!("Config validation: {name} is too short (minimum 5 minutes)"),
                });
            }
            if expiry.as_secs() > 86400 * 30 {
                return Err(Error::Internal {
                    operation: format!("Config validation: {name} is too long (maximum 30 days)"),
                });
            }
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self
            .auth
            .cors
            .allowed_origins
            .iter()
            .any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.auth.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        if self.admin.email.is_some() != self.admin.password.is_some() {
            return Err(Error::Internal {
                operation: "Config validation: admin.email and admin.password must be set together".to_string(),
            });
        }

        if !(self.rides.captain_search_radius_km > 0.0) {
            return Err(Error::Internal {
                operation: "Config validation: rides.captain_search_radius_km must be positive".to_string(),
            });
        }

        if !(4..=8).contains(&self.rides.otp_length) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: rides.otp_length ({}) must be between 4 and 8",
                    self.rides.otp_length
                ),
            });
        }

        let fares = &self.rides.fares;
        for (name, rate) in [("auto", &fares.auto), ("car", &fares.car), ("bike", &fares.bike)] {
            if rate.base < 0.0 || rate.per_km < 0.0 || rate.per_minute < 0.0 {
                return Err(Error::Internal {
                    operation: format!("Config validation: rides.fares.{name} cannot contain negative values"),
                });
            }
        }

        if let MapsConfig::Static(maps) = &self.maps
            && !(maps.average_speed_kmh > 0.0)
        {
            return Err(Error::Internal {
                operation: "Config validation: maps.static.average_speed_kmh must be positive".to_string(),
            });
        }

        let mut urls = Vec::new();
        if let MapsConfig::OpenStreetMap(osm) = &self.maps {
            urls.push(("maps.openstreetmap.nominatim_url", &osm.nominatim_url));
            urls.push(("maps.openstreetmap.osrm_url", &osm.osrm_url));
        }
        if let PaymentConfig::Razorpay(rzp) = &self.payment {
            urls.push(("payment.razorpay.api_url", &rzp.api_url));
        }
        for (name, value) in urls {
            if let Err(e) = Url::parse(value) {
                return Err(Error::Internal {
                    operation: format!("Config validation: {name} is not a valid URL: {e}"),
                });
            }
        }

        if self.realtime.channel_capacity == 0 {
            return Err(Error::Internal {
                operation: "Config validation: realtime.channel_capacity cannot be 0".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("RIDEWAY_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    fn valid_config() -> Config {
        Config {
            secret_key: Some("test-secret-key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
frontend_url: https://ride.example.com
"#,
            )?;

            jail.set_env("RIDEWAY_HOST", "127.0.0.1");
            jail.set_env("RIDEWAY_PORT", "8080");
            jail.set_env("RIDEWAY_RIDES__CAPTAIN_SEARCH_RADIUS_KM", "5.5");

            let config = Config::load(&args("test.yaml"))?;

            // Env vars should override
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert_eq!(config.rides.captain_search_radius_km, 5.5);

            // YAML values should be preserved
            assert_eq!(config.frontend_url, "https://ride.example.com");

            Ok(())
        });
    }

    #[test]
    fn test_database_url_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
database:
  url: sqlite://from-yaml.db
  pool:
    max_connections: 3
"#,
            )?;
            jail.set_env("DATABASE_URL", "sqlite://from-env.db?mode=rwc");

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.database.url, "sqlite://from-env.db?mode=rwc");
            assert_eq!(config.database.pool.max_connections, 3);

            Ok(())
        });
    }

    #[test]
    fn test_provider_sections() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
payment:
  razorpay:
    key_id: rzp_test_123
    key_secret: shh
maps:
  static:
    average_speed_kmh: 25
    places:
      - name: Central Station
        ltd: 12.97
        lng: 77.59
rides:
  otp_length: 4
  fares:
    bike:
      base: 15
      per_km: 7
      per_minute: 1
auth:
  session:
    timeout: 2h
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            match &config.payment {
                PaymentConfig::Razorpay(rzp) => {
                    assert_eq!(rzp.key_id, "rzp_test_123");
                    assert_eq!(rzp.api_url, "https://api.razorpay.com/v1/");
                }
                other => panic!("expected razorpay, got {other:?}"),
            }
            match &config.maps {
                MapsConfig::Static(maps) => {
                    assert_eq!(maps.places.len(), 1);
                    assert_eq!(maps.average_speed_kmh, 25.0);
                }
                other => panic!("expected static maps, got {other:?}"),
            }
            assert_eq!(config.rides.otp_length, 4);
            assert_eq!(config.rides.fares.bike, FareRate::new(15.0, 7.0, 1.0));
            // untouched rates keep their defaults
            assert_eq!(config.rides.fares.car, FareRate::new(50.0, 15.0, 3.0));
            assert_eq!(config.auth.session.timeout, Duration::from_secs(2 * 60 * 60));
            assert_eq!(config.auth.session.cookie_name, "token");

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
rides:
  surge_multiplier: 2
"#,
            )?;

            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_config_validation_missing_secret() {
        let config = Config::default();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("secret_key is not configured"));
    }

    #[test]
    fn test_config_validation_invalid_password_length() {
        let mut config = valid_config();
        config.auth.password.min_length = 10;
        config.auth.password.max_length = 5;

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("min_length"));
    }

    #[test]
    fn test_config_validation_session_bounds() {
        let mut config = valid_config();
        config.auth.session.timeout = Duration::from_secs(60);
        assert!(config.validate().unwrap_err().to_string().contains("too short"));

        let mut config = valid_config();
        config.auth.admin_session_expiry = Duration::from_secs(86400 * 31);
        assert!(config.validate().unwrap_err().to_string().contains("too long"));
    }

    #[test]
    fn test_config_validation_wildcard_with_credentials() {
        let mut config = valid_config();
        config.auth.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        config.auth.cors.allow_credentials = true;
        assert!(config.validate().unwrap_err().to_string().contains("wildcard"));

        config.auth.cors.allow_credentials = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_ride_settings() {
        let mut config = valid_config();
        config.rides.captain_search_radius_km = 0.0;
        assert!(config.validate().unwrap_err().to_string().contains("captain_search_radius_km"));

        let mut config = valid_config();
        config.rides.otp_length = 3;
        assert!(config.validate().unwrap_err().to_string().contains("otp_length"));

        let mut config = valid_config();
        config.rides.fares.car.per_km = -1.0;
        assert!(config.validate().unwrap_err().to_string().contains("rides.fares.car"));
    }

    #[test]
    fn test_config_validation_admin_pair() {
        let mut config = valid_config();
        config.admin.email = Some("admin@example.com".to_string());
        assert!(config.validate().is_err());

        config.admin.password = Some("hunter22".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_valid_config() {
        assert!(valid_config().validate().is_ok());
    }
}
