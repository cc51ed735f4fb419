//! Fare calculation.
//!
//! `fare = round(base + km * per_km + minutes * per_minute)`, in whole currency units.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::{FareRate, FaresConfig};
use crate::types::VehicleType;

/// Fares for every vehicle type over the same route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FareQuote {
    pub auto: i64,
    pub car: i64,
    pub bike: i64,
}

impl FareQuote {
    pub fn for_vehicle(&self, vehicle_type: VehicleType) -> i64 {
        match vehicle_type {
            VehicleType::Auto => self.auto,
            VehicleType::Car => self.car,
            VehicleType::Bike => self.bike,
        }
    }
}

impl FaresConfig {
    pub fn rate(&self, vehicle_type: VehicleType) -> &FareRate {
        match vehicle_type {
            VehicleType::Auto => &self.auto,
            VehicleType::Car => &self.car,
            VehicleType::Bike => &self.bike,
        }
    }
}

/// Price one vehicle type over a route given in metres and seconds.
pub fn fare_for(rate: &FareRate, distance_meters: i64, duration_seconds: i64) -> i64 {
    let km = distance_meters as f64 / 1000.0;
    let minutes = duration_seconds as f64 / 60.0;
    (rate.base + km * rate.per_km + minutes * rate.per_minute).round() as i64
}

pub fn quote(fares: &FaresConfig, distance_meters: i64, duration_seconds: i64) -> FareQuote {
    let price = |vehicle_type| fare_for(fares.rate(vehicle_type), distance_meters, duration_seconds);
    FareQuote {
        auto: price(VehicleType::Auto),
        car: price(VehicleType::Car),
        bike: price(VehicleType::Bike),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fares() {
        // 5 km, 15 minutes
        let quote = quote(&FaresConfig::default(), 5000, 900);
        assert_eq!(quote.auto, 30 + 50 + 30);
        assert_eq!(quote.car, 50 + 75 + 45);
        // 20 + 40 + 22.5 rounds half away from zero
        assert_eq!(quote.bike, 83);
    }

    #[test]
    fn test_zero_distance_is_base_fare() {
        let quote = quote(&FaresConfig::default(), 0, 0);
        assert_eq!(quote, FareQuote { auto: 30, car: 50, bike: 20 });
    }

    #[test]
    fn test_fare_rounding() {
        let rate = FareRate::new(10.0, 1.0, 0.0);
        assert_eq!(fare_for(&rate, 1400, 0), 11);
        assert_eq!(fare_for(&rate, 1600, 0), 12);
    }

    #[test]
    fn test_for_vehicle_lookup() {
        let quote = FareQuote { auto: 1, car: 2, bike: 3 };
        assert_eq!(quote.for_vehicle(VehicleType::Car), 2);
        assert_eq!(quote.for_vehicle(VehicleType::Bike), 3);
    }
}
