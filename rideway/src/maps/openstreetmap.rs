//! Nominatim geocoding and OSRM routing.
//!
//! Nominatim's public instance allows about one request per second from an identified client, so
//! every Nominatim call waits on a shared throttle first. OSRM calls are not throttled.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};
use url::Url;

use super::{Coordinates, DistanceTime, MAX_SUGGESTIONS, MapsError, MapsProvider};
use crate::config::OpenStreetMapConfig;

/// Address parts joined into a suggestion, in display order
const ADDRESS_PARTS: [&str; 9] = [
    "road",
    "neighbourhood",
    "suburb",
    "city",
    "town",
    "village",
    "county",
    "state",
    "country",
];

#[serde_as]
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde_as(as = "DisplayFromStr")]
    lat: f64,
    #[serde_as(as = "DisplayFromStr")]
    lon: f64,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    address: HashMap<String, serde_json::Value>,
}

impl NominatimPlace {
    fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    /// Joined address parts, or the display name when none are present.
    fn suggestion(&self) -> String {
        let parts: Vec<&str> = ADDRESS_PARTS
            .iter()
            .filter_map(|key| self.address.get(*key).and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            self.display_name.clone()
        } else {
            parts.join(", ")
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Metres
    distance: f64,
    /// Seconds
    duration: f64,
}

/// Makes sure a url has a trailing slash so `join` appends rather than replaces.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let path = format!("{}/", new_url.path());
        new_url.set_path(&path);
        new_url
    }
}

pub struct OpenStreetMap {
    client: Client,
    nominatim_url: Url,
    osrm_url: Url,
    min_request_interval: Duration,
    last_nominatim_request: Mutex<Option<Instant>>,
}

impl OpenStreetMap {
    pub fn new(config: &OpenStreetMapConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            nominatim_url: ensure_slash(&Url::parse(&config.nominatim_url)?),
            osrm_url: ensure_slash(&Url::parse(&config.osrm_url)?),
            min_request_interval: config.min_request_interval,
            last_nominatim_request: Mutex::new(None),
        })
    }

    /// Wait until at least `min_request_interval` has passed since the previous Nominatim call.
    ///
    /// The lock is held across the sleep, which queues concurrent callers in order.
    async fn throttle(&self) {
        let mut last = self.last_nominatim_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_request_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn search(&self, query: &str, limit: usize, address_details: bool) -> Result<Vec<NominatimPlace>, MapsError> {
        let mut url = self
            .nominatim_url
            .join("search")
            .map_err(|e| MapsError::Provider(format!("invalid nominatim url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());
        if address_details {
            url.query_pairs_mut().append_pair("addressdetails", "1");
        }

        self.throttle().await;
        debug!("Nominatim search: {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MapsError::Provider(format!("nominatim returned {}", response.status())));
        }

        Ok(response.json::<Vec<NominatimPlace>>().await?)
    }

    async fn route(&self, from: Coordinates, to: Coordinates) -> Result<OsrmRoute, MapsError> {
        let path = format!("route/v1/driving/{},{};{},{}", from.lng, from.ltd, to.lng, to.ltd);
        let mut url = self
            .osrm_url
            .join(&path)
            .map_err(|e| MapsError::Provider(format!("invalid osrm url: {e}")))?;
        url.query_pairs_mut().append_pair("overview", "false");

        debug!("OSRM route: {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MapsError::Provider(format!("osrm returned {}", response.status())));
        }

        let body = response.json::<OsrmResponse>().await?;
        body.routes.into_iter().next().ok_or(MapsError::NoRoute)
    }
}

#[async_trait]
impl MapsProvider for OpenStreetMap {
    #[instrument(skip(self), err)]
    async fn geocode(&self, address: &str) -> Result<Coordinates, MapsError> {
        self.search(address, 1, false)
            .await?
            .first()
            .map(NominatimPlace::coordinates)
            .ok_or_else(|| MapsError::AddressNotFound(address.to_string()))
    }

    #[instrument(skip(self), err)]
    async fn distance_time(&self, origin: &str, destination: &str) -> Result<DistanceTime, MapsError> {
        let from = self.geocode(origin).await?;
        let to = self.geocode(destination).await?;
        let route = self.route(from, to).await?;
        Ok(DistanceTime::new(route.distance, route.duration))
    }

    #[instrument(skip(self), err)]
    async fn suggestions(&self, input: &str) -> Result<Vec<String>, MapsError> {
        let places = self.search(input, MAX_SUGGESTIONS, true).await?;
        Ok(places.iter().take(MAX_SUGGESTIONS).map(NominatimPlace::suggestion).collect())
    }
}
