//! API request/response models for the admin dashboard.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::captains::CaptainResponse;
use crate::api::models::rides::RideResponse;
use crate::api::models::users::UserResponse;
use crate::db::handlers::analytics::{DailyEarnings, DashboardCounts};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminLoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EarningsPoint {
    pub date: NaiveDate,
    pub total_earnings: i64,
    pub ride_count: i64,
}

impl From<DailyEarnings> for EarningsPoint {
    fn from(day: DailyEarnings) -> Self {
        Self {
            date: day.date,
            total_earnings: day.total_earnings,
            ride_count: day.ride_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub total_users: i64,
    pub total_captains: i64,
    pub total_rides: i64,
    pub completed_rides: i64,
    /// Confirmed plus started
    pub active_rides: i64,
    pub recent_rides: Vec<RideResponse>,
    /// Completed rides over the last seven UTC days, oldest first
    pub earnings_data: Vec<EarningsPoint>,
}

impl DashboardResponse {
    pub fn new(counts: DashboardCounts, recent_rides: Vec<RideResponse>, earnings: Vec<DailyEarnings>) -> Self {
        Self {
            total_users: counts.total_users,
            total_captains: counts.total_captains,
            total_rides: counts.total_rides,
            completed_rides: counts.completed_rides,
            active_rides: counts.active_rides,
            recent_rides,
            earnings_data: earnings.into_iter().map(EarningsPoint::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserBlockResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptainBlockResponse {
    pub message: String,
    pub captain: CaptainResponse,
}

/// "User blocked successfully" or "Captain unblocked successfully"
pub fn block_message(subject: &str, is_blocked: bool) -> String {
    let verb = if is_blocked { "blocked" } else { "unblocked" };
    format!("{subject} {verb} successfully")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_message() {
        assert_eq!(block_message("User", true), "User blocked successfully");
        assert_eq!(block_message("Captain", false), "Captain unblocked successfully");
    }

    #[test]
    fn test_dashboard_serialises_camel_case() {
        let response = DashboardResponse::new(
            DashboardCounts {
                total_users: 3,
                active_rides: 1,
                ..Default::default()
            },
            vec![],
            vec![DailyEarnings {
                date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                total_earnings: 420,
                ride_count: 4,
            }],
        );
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["totalUsers"], 3);
        assert_eq!(value["activeRides"], 1);
        assert_eq!(value["earningsData"][0]["date"], "2025-03-01");
        assert_eq!(value["earningsData"][0]["totalEarnings"], 420);
    }
}
