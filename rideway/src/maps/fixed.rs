//! Offline maps provider backed by a configured list of places.
//!
//! Travel time is great-circle distance at a constant average speed.

use async_trait::async_trait;

use super::{Coordinates, DistanceTime, MAX_SUGGESTIONS, MapsError, MapsProvider, haversine_km};
use crate::config::{StaticMapsConfig, StaticPlace};

pub struct FixedMaps {
    places: Vec<StaticPlace>,
    average_speed_kmh: f64,
}

impl FixedMaps {
    pub fn new(config: &StaticMapsConfig) -> Self {
        Self {
            places: config.places.clone(),
            average_speed_kmh: config.average_speed_kmh,
        }
    }

    fn lookup(&self, address: &str) -> Option<&StaticPlace> {
        let wanted = address.trim();
        self.places.iter().find(|p| p.name.eq_ignore_ascii_case(wanted))
    }
}

#[async_trait]
impl MapsProvider for FixedMaps {
    async fn geocode(&self, address: &str) -> Result<Coordinates, MapsError> {
        self.lookup(address)
            .map(|p| Coordinates::new(p.ltd, p.lng))
            .ok_or_else(|| MapsError::AddressNotFound(address.to_string()))
    }

    async fn distance_time(&self, origin: &str, destination: &str) -> Result<DistanceTime, MapsError> {
        let from = self.geocode(origin).await?;
        let to = self.geocode(destination).await?;
        let km = haversine_km(from, to);
        let hours = km / self.average_speed_kmh;
        Ok(DistanceTime::new(km * 1000.0, hours * 3600.0))
    }

    async fn suggestions(&self, input: &str) -> Result<Vec<String>, MapsError> {
        let needle = input.trim().to_lowercase();
        Ok(self
            .places
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .map(|p| p.name.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps() -> FixedMaps {
        FixedMaps::new(&StaticMapsConfig {
            places: vec![
                StaticPlace {
                    name: "Central Station".to_string(),
                    ltd: 0.0,
                    lng: 0.0,
                },
                StaticPlace {
                    name: "Central Park".to_string(),
                    ltd: 0.09,
                    lng: 0.0,
                },
            ],
            average_speed_kmh: 30.0,
        })
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let coords = maps().geocode("  central PARK ").await.unwrap();
        assert_eq!(coords, Coordinates::new(0.09, 0.0));
        assert!(matches!(maps().geocode("Nowhere").await, Err(MapsError::AddressNotFound(_))));
    }

    #[tokio::test]
    async fn test_distance_time_at_average_speed() {
        // 0.09 degrees of latitude is just over 10 km, a little over 20 minutes at 30 km/h
        let dt = maps().distance_time("Central Station", "Central Park").await.unwrap();
        assert_eq!(dt.distance.text, "10.0 km");
        assert_eq!(dt.duration.text, "21 mins");
    }

    #[tokio::test]
    async fn test_suggestions_substring_match() {
        let all = maps().suggestions("central").await.unwrap();
        assert_eq!(all, vec!["Central Station", "Central Park"]);
        assert!(maps().suggestions("airport").await.unwrap().is_empty());
    }
}
