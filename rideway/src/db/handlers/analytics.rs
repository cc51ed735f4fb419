//! Aggregate queries behind the admin dashboard and the captain stats card.
//!
//! Day boundaries are UTC midnights.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    handlers::{Ratings, Rides},
    models::rides::RideDBResponse,
};
use crate::rides::lifecycle::RideStatus;
use crate::types::{CaptainId, abbrev_uuid};

/// Headline counts for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub total_users: i64,
    pub total_captains: i64,
    pub total_rides: i64,
    pub completed_rides: i64,
    /// Confirmed plus started
    pub active_rides: i64,
}

/// Completed-ride totals for one UTC day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyEarnings {
    pub date: NaiveDate,
    pub total_earnings: i64,
    pub ride_count: i64,
}

#[derive(Debug, Clone)]
pub struct CaptainStats {
    pub today_rides: i64,
    pub today_earnings: i64,
    pub recent_rides: Vec<RideDBResponse>,
    pub rating: f64,
    pub rating_change: f64,
    pub ride_change: f64,
    pub earnings_change: f64,
}

/// Start of the UTC day containing `at`.
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Percentage change from `previous` to `current`, one decimal place. Zero without a baseline.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous <= 0.0 {
        return 0.0;
    }
    ((current - previous) / previous * 1000.0).round() / 10.0
}

/// Group completed rides by the UTC day they finished on, ascending.
pub fn group_by_day(rides: &[RideDBResponse]) -> Vec<DailyEarnings> {
    let mut days: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for ride in rides {
        let Some(completed_at) = ride.completed_at else { continue };
        let entry = days.entry(completed_at.date_naive()).or_default();
        entry.0 += ride.fare;
        entry.1 += 1;
    }

    days.into_iter()
        .map(|(date, (total_earnings, ride_count))| DailyEarnings {
            date,
            total_earnings,
            ride_count,
        })
        .collect()
}

pub struct Analytics<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Analytics<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn dashboard_counts(&mut self) -> Result<DashboardCounts> {
        let (total_users, total_captains, total_rides): (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM captains), (SELECT COUNT(*) FROM rides)",
        )
        .fetch_one(&mut *self.db)
        .await?;

        let mut rides = Rides::new(&mut *self.db);
        let completed_rides = rides.count_in_statuses(&[RideStatus::Completed]).await?;
        let active_rides = rides.count_in_statuses(&[RideStatus::Confirmed, RideStatus::Started]).await?;

        Ok(DashboardCounts {
            total_users,
            total_captains,
            total_rides,
            completed_rides,
            active_rides,
        })
    }

    /// Earnings for the last `days` UTC days, today included. Days without rides are omitted.
    #[instrument(skip(self), err)]
    pub async fn earnings_by_day(&mut self, now: DateTime<Utc>, days: i64) -> Result<Vec<DailyEarnings>> {
        let from = start_of_day(now) - Duration::days(days - 1);
        let rides = Rides::new(&mut *self.db).completed_between(None, from, now + Duration::seconds(1)).await?;
        Ok(group_by_day(&rides))
    }

    #[instrument(skip(self), fields(captain_id = %abbrev_uuid(&captain_id)), err)]
    pub async fn captain_stats(&mut self, captain_id: CaptainId, aggregate_rating: f64, now: DateTime<Utc>) -> Result<CaptainStats> {
        let today = start_of_day(now);
        let yesterday = today - Duration::days(1);
        let until = now + Duration::seconds(1);

        let mut rides = Rides::new(&mut *self.db);
        let today_rides = rides.completed_between(Some(captain_id), today, until).await?;
        let yesterday_rides = rides.completed_between(Some(captain_id), yesterday, today).await?;
        let recent_rides = rides.recent_completed_for_captain(captain_id, 5).await?;

        let today_earnings: i64 = today_rides.iter().map(|r| r.fare).sum();
        let yesterday_earnings: i64 = yesterday_rides.iter().map(|r| r.fare).sum();

        let week = Duration::days(7);
        let mut ratings = Ratings::new(&mut *self.db);
        let last_week = ratings.average_for_captain_between(captain_id, now - week, until).await?;
        let previous_week = ratings.average_for_captain_between(captain_id, now - week * 2, now - week).await?;

        let rating = last_week.unwrap_or(aggregate_rating);
        let previous = previous_week.unwrap_or(rating);

        Ok(CaptainStats {
            today_rides: today_rides.len() as i64,
            today_earnings,
            recent_rides,
            rating,
            rating_change: percent_change(rating, previous),
            ride_change: percent_change(today_rides.len() as f64, yesterday_rides.len() as f64),
            earnings_change: percent_change(today_earnings as f64, yesterday_earnings as f64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::rides::RideCreateDBRequest;
    use crate::rides::lifecycle::{Actor, Transition};
    use crate::test_utils::{create_test_captain, create_test_user};
    use crate::types::{UserId, VehicleType};
    use sqlx::SqlitePool;

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(6.0, 4.0), 50.0);
        assert_eq!(percent_change(4.0, 5.0), -20.0);
        assert_eq!(percent_change(3.3, 3.0), 10.0);
        assert_eq!(percent_change(3.0, 0.0), 0.0);
        assert_eq!(percent_change(4.0, 4.0), 0.0);
    }

    #[test]
    fn test_start_of_day() {
        let at = DateTime::parse_from_rfc3339("2025-03-04T17:45:10Z").unwrap().with_timezone(&Utc);
        assert_eq!(start_of_day(at).to_rfc3339(), "2025-03-04T00:00:00+00:00");
    }

    async fn make_ride(rides: &mut Rides<'_>, user_id: UserId, fare: i64) -> RideDBResponse {
        rides
            .create(&RideCreateDBRequest {
                user_id,
                pickup: "A".to_string(),
                destination: "B".to_string(),
                pickup_latitude: None,
                pickup_longitude: None,
                vehicle_type: VehicleType::Car,
                fare,
                distance_meters: None,
                duration_seconds: None,
                otp: "0000".to_string(),
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_dashboard_and_captain_stats(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let second_user = create_test_user(&pool).await;
        let third_user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Car).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut rides = Rides::new(&mut conn);
        let actor = Actor::Captain(captain.id);

        let done = make_ride(&mut rides, user.id, 120).await;
        for transition in [Transition::Confirm, Transition::Start, Transition::Complete] {
            rides.apply_transition(done.id, transition, actor).await.unwrap().unwrap();
        }
        let active = make_ride(&mut rides, second_user.id, 80).await;
        rides.apply_transition(active.id, Transition::Confirm, actor).await.unwrap().unwrap();
        let _pending = make_ride(&mut rides, third_user.id, 60).await;

        let mut analytics = Analytics::new(&mut conn);
        let counts = analytics.dashboard_counts().await.unwrap();
        assert_eq!(
            counts,
            DashboardCounts {
                total_users: 3,
                total_captains: 1,
                total_rides: 3,
                completed_rides: 1,
                active_rides: 1,
            }
        );

        let now = Utc::now();
        let earnings = analytics.earnings_by_day(now, 7).await.unwrap();
        assert_eq!(earnings.len(), 1);
        assert_eq!(earnings[0].total_earnings, 120);
        assert_eq!(earnings[0].ride_count, 1);

        let stats = analytics.captain_stats(captain.id, 4.2, now).await.unwrap();
        assert_eq!(stats.today_rides, 1);
        assert_eq!(stats.today_earnings, 120);
        assert_eq!(stats.recent_rides.len(), 1);
        // No ratings this week: falls back to the aggregate
        assert_eq!(stats.rating, 4.2);
        assert_eq!(stats.rating_change, 0.0);
        assert_eq!(stats.ride_change, 0.0);
    }
}
