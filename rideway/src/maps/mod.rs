//! Geocoding, routing and place suggestions.
//!
//! [`MapsProvider`] is implemented by [`openstreetmap::OpenStreetMap`] (Nominatim search plus OSRM
//! routing) and by [`fixed::FixedMaps`], a configured gazetteer used in development and tests.

pub mod fixed;
pub mod openstreetmap;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::MapsConfig;
use crate::errors::Error;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the map. `ltd` is latitude, `lng` longitude, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub ltd: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(ltd: f64, lng: f64) -> Self {
        Self { ltd, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.ltd) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance between two points.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.ltd.to_radians(), b.ltd.to_radians());
    let d_lat = (b.ltd - a.ltd).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// A distance or duration with its display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Measure {
    pub text: String,
    /// Metres or seconds
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DistanceTime {
    pub distance: Measure,
    pub duration: Measure,
    pub status: String,
}

impl DistanceTime {
    /// `"12.3 km"` and `"25 mins"`, minutes rounded up.
    pub fn new(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            distance: Measure {
                text: format!("{:.1} km", distance_meters / 1000.0),
                value: distance_meters,
            },
            duration: Measure {
                text: format!("{} mins", (duration_seconds / 60.0).ceil() as i64),
                value: duration_seconds,
            },
            status: "OK".to_string(),
        }
    }

    pub fn distance_meters(&self) -> i64 {
        self.distance.value.round() as i64
    }

    pub fn duration_seconds(&self) -> i64 {
        self.duration.value.round() as i64
    }
}

/// Most suggestions returned for one query
pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum MapsError {
    #[error("No location found for {0:?}")]
    AddressNotFound(String),

    #[error("No route found")]
    NoRoute,

    #[error("Maps provider request failed: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for MapsError {
    fn from(e: reqwest::Error) -> Self {
        MapsError::Provider(e.to_string())
    }
}

impl From<MapsError> for Error {
    fn from(e: MapsError) -> Self {
        match e {
            MapsError::AddressNotFound(_) => Error::NotFound {
                message: "Location not found".to_string(),
            },
            MapsError::NoRoute => Error::NotFound {
                message: "No route found".to_string(),
            },
            MapsError::Provider(message) => Error::Upstream {
                service: "maps".to_string(),
                message,
            },
        }
    }
}

#[async_trait]
pub trait MapsProvider: Send + Sync {
    /// Resolve a free-form address to its best match.
    async fn geocode(&self, address: &str) -> Result<Coordinates, MapsError>;

    /// Driving distance and time between two addresses.
    async fn distance_time(&self, origin: &str, destination: &str) -> Result<DistanceTime, MapsError>;

    /// Up to [`MAX_SUGGESTIONS`] place names matching `input`.
    async fn suggestions(&self, input: &str) -> Result<Vec<String>, MapsError>;
}

pub fn create_provider(config: &MapsConfig) -> anyhow::Result<Arc<dyn MapsProvider>> {
    Ok(match config {
        MapsConfig::OpenStreetMap(osm) => Arc::new(openstreetmap::OpenStreetMap::new(osm)?),
        MapsConfig::Static(fixed) => Arc::new(fixed::FixedMaps::new(fixed)),
    })
}
