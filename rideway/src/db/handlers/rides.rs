//! Database repository for rides.
//!
//! Status changes go through [`Rides::apply_transition`], a single conditional `UPDATE` that only
//! matches while the ride is still in one of the transition's source states. Two requests racing
//! for the same ride cannot both succeed.

use std::collections::HashMap;

use crate::db::{
    errors::Result,
    models::rides::{RideCreateDBRequest, RideDBResponse, RideFilter, RideParticipant},
};
use crate::rides::lifecycle::{Actor, RideStatus, Transition};
use crate::types::{CaptainId, RideId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct Rides<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Rides<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &RideCreateDBRequest) -> Result<RideDBResponse> {
        let now = Utc::now();
        let ride = sqlx::query_as::<_, RideDBResponse>(
            r#"
            INSERT INTO rides (
                id, user_id, pickup, destination, pickup_latitude, pickup_longitude,
                vehicle_type, fare, distance_meters, duration_seconds, otp,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.pickup)
        .bind(&request.destination)
        .bind(request.pickup_latitude)
        .bind(request.pickup_longitude)
        .bind(request.vehicle_type)
        .bind(request.fare)
        .bind(request.distance_meters)
        .bind(request.duration_seconds)
        .bind(&request.otp)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(ride)
    }

    #[instrument(skip(self), fields(ride_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: RideId) -> Result<Option<RideDBResponse>> {
        let ride = sqlx::query_as::<_, RideDBResponse>("SELECT * FROM rides WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(ride)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn get_bulk(&mut self, ids: Vec<RideId>) -> Result<HashMap<RideId, RideDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM rides WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rides = query.build_query_as::<RideDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rides.into_iter().map(|r| (r.id, r)).collect())
    }

    /// The participant's pending, confirmed or started ride, if any.
    #[instrument(skip(self), err)]
    pub async fn find_unfinished(&mut self, participant: RideParticipant) -> Result<Option<RideDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM rides WHERE ");
        push_participant(&mut query, participant);
        query.push(" AND status IN (");
        let mut separated = query.separated(", ");
        for status in RideStatus::UNFINISHED {
            separated.push_bind(status);
        }
        separated.push_unseparated(") ORDER BY created_at DESC LIMIT 1");

        let ride = query.build_query_as::<RideDBResponse>().fetch_optional(&mut *self.db).await?;
        Ok(ride)
    }

    /// Move a ride to `transition.target()` if it is still in one of `transition.from_states()`
    /// and `actor` is allowed to drive it.
    ///
    /// Returns the updated ride, or `None` if nothing matched (unknown ride, wrong actor, or the
    /// ride already moved on).
    #[instrument(skip(self), fields(ride_id = %abbrev_uuid(&id)), err)]
    pub async fn apply_transition(&mut self, id: RideId, transition: Transition, actor: Actor) -> Result<Option<RideDBResponse>> {
        let now = Utc::now();
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE rides SET status = ");
        query.push_bind(transition.target());
        query.push(format!(", {} = ", transition.timestamp_column()));
        query.push_bind(now);
        query.push(", updated_at = ");
        query.push_bind(now);

        match (transition, actor) {
            (Transition::Confirm, Actor::Captain(captain_id)) => {
                query.push(", captain_id = ");
                query.push_bind(captain_id);
            }
            (Transition::Cancel, Actor::User(_)) => {
                query.push(", cancelled_by = 'user'");
            }
            (Transition::Cancel, Actor::Captain(_)) => {
                query.push(", cancelled_by = 'captain'");
            }
            _ => {}
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        match (transition, actor) {
            (Transition::Confirm, Actor::Captain(_)) => {}
            (_, Actor::User(user_id)) => {
                query.push(" AND user_id = ");
                query.push_bind(user_id);
            }
            (_, Actor::Captain(captain_id)) => {
                query.push(" AND captain_id = ");
                query.push_bind(captain_id);
            }
        }

        query.push(" AND status IN (");
        let mut separated = query.separated(", ");
        for status in transition.from_states() {
            separated.push_bind(*status);
        }
        separated.push_unseparated(") RETURNING *");

        let ride = query.build_query_as::<RideDBResponse>().fetch_optional(&mut *self.db).await?;
        Ok(ride)
    }

    /// Record that the rider paid. Returns `false` for unknown rides.
    #[instrument(skip(self), fields(ride_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_paid(&mut self, id: RideId) -> Result<bool> {
        let result = sqlx::query("UPDATE rides SET payment_status = 'paid', updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &RideFilter) -> Result<Vec<RideDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM rides WHERE 1 = 1");
        push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let rides = query.build_query_as::<RideDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rides)
    }

    /// Count rides matching the filter, ignoring `skip` and `limit`.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &RideFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM rides WHERE 1 = 1");
        push_filter(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, statuses), err)]
    pub async fn count_in_statuses(&mut self, statuses: &[RideStatus]) -> Result<i64> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM rides WHERE status IN (");
        let mut separated = query.separated(", ");
        for status in statuses {
            separated.push_bind(*status);
        }
        separated.push_unseparated(")");

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Completed rides whose completion time falls in `[from, to)`, optionally for one captain.
    #[instrument(skip(self), err)]
    pub async fn completed_between(
        &mut self,
        captain_id: Option<CaptainId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RideDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM rides WHERE status = 'completed' AND completed_at >= ");
        query.push_bind(from);
        query.push(" AND completed_at < ");
        query.push_bind(to);
        if let Some(captain_id) = captain_id {
            query.push(" AND captain_id = ");
            query.push_bind(captain_id);
        }
        query.push(" ORDER BY completed_at ASC");

        let rides = query.build_query_as::<RideDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rides)
    }

    /// The captain's most recently completed rides.
    #[instrument(skip(self), fields(captain_id = %abbrev_uuid(&captain_id)), err)]
    pub async fn recent_completed_for_captain(&mut self, captain_id: CaptainId, limit: i64) -> Result<Vec<RideDBResponse>> {
        let rides = sqlx::query_as::<_, RideDBResponse>(
            "SELECT * FROM rides WHERE captain_id = ? AND status = 'completed' ORDER BY completed_at DESC LIMIT ?",
        )
        .bind(captain_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rides)
    }
}

fn push_participant(query: &mut QueryBuilder<'_, Sqlite>, participant: RideParticipant) {
    match participant {
        RideParticipant::User(user_id) => {
            query.push("user_id = ");
            query.push_bind(user_id);
        }
        RideParticipant::Captain(captain_id) => {
            query.push("captain_id = ");
            query.push_bind(captain_id);
        }
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &RideFilter) {
    if let Some(participant) = filter.participant {
        query.push(" AND ");
        push_participant(query, participant);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rides::lifecycle::PaymentStatus;
    use crate::test_utils::{create_test_captain, create_test_user};
    use crate::types::{AccountKind, UserId, VehicleType};
    use sqlx::SqlitePool;

    fn ride_request(user_id: UserId) -> RideCreateDBRequest {
        RideCreateDBRequest {
            user_id,
            pickup: "Central Station".to_string(),
            destination: "Airport".to_string(),
            pickup_latitude: Some(12.97),
            pickup_longitude: Some(77.59),
            vehicle_type: VehicleType::Auto,
            fare: 193,
            distance_meters: Some(12_300),
            duration_seconds: Some(1_500),
            otp: "123456".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_full_lifecycle(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Auto).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Rides::new(&mut conn);

        let ride = repo.create(&ride_request(user.id)).await.unwrap();
        assert_eq!(ride.status, RideStatus::Pending);
        assert_eq!(ride.payment_status, PaymentStatus::Unpaid);
        assert!(ride.captain_id.is_none());

        let captain_actor = Actor::Captain(captain.id);
        let confirmed = repo
            .apply_transition(ride.id, Transition::Confirm, captain_actor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(confirmed.status, RideStatus::Confirmed);
        assert_eq!(confirmed.captain_id, Some(captain.id));
        assert!(confirmed.confirmed_at.is_some());

        let started = repo.apply_transition(ride.id, Transition::Start, captain_actor).await.unwrap().unwrap();
        assert!(started.started_at.is_some());

        let completed = repo
            .apply_transition(ride.id, Transition::Complete, captain_actor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completed.status, RideStatus::Completed);

        // No longer cancellable
        let cancelled = repo.apply_transition(ride.id, Transition::Cancel, Actor::User(user.id)).await.unwrap();
        assert!(cancelled.is_none());

        assert!(repo.mark_paid(ride.id).await.unwrap());
        let paid = repo.get_by_id(ride.id).await.unwrap().unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_second_confirm_matches_nothing(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let first = create_test_captain(&pool, VehicleType::Auto).await;
        let second = create_test_captain(&pool, VehicleType::Auto).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Rides::new(&mut conn);

        let ride = repo.create(&ride_request(user.id)).await.unwrap();
        assert!(
            repo.apply_transition(ride.id, Transition::Confirm, Actor::Captain(first.id))
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            repo.apply_transition(ride.id, Transition::Confirm, Actor::Captain(second.id))
                .await
                .unwrap()
                .is_none()
        );

        let stored = repo.get_by_id(ride.id).await.unwrap().unwrap();
        assert_eq!(stored.captain_id, Some(first.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_only_assigned_captain_can_start(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let assigned = create_test_captain(&pool, VehicleType::Auto).await;
        let other = create_test_captain(&pool, VehicleType::Auto).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Rides::new(&mut conn);

        let ride = repo.create(&ride_request(user.id)).await.unwrap();
        repo.apply_transition(ride.id, Transition::Confirm, Actor::Captain(assigned.id))
            .await
            .unwrap();

        assert!(
            repo.apply_transition(ride.id, Transition::Start, Actor::Captain(other.id))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            repo.apply_transition(ride.id, Transition::Start, Actor::Captain(assigned.id))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_records_party(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Auto).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Rides::new(&mut conn);

        let by_user = repo.create(&ride_request(user.id)).await.unwrap();
        let cancelled = repo
            .apply_transition(by_user.id, Transition::Cancel, Actor::User(user.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.cancelled_by, Some(AccountKind::User));
        assert!(cancelled.cancelled_at.is_some());

        let by_captain = repo.create(&ride_request(user.id)).await.unwrap();
        repo.apply_transition(by_captain.id, Transition::Confirm, Actor::Captain(captain.id))
            .await
            .unwrap();
        let cancelled = repo
            .apply_transition(by_captain.id, Transition::Cancel, Actor::Captain(captain.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.cancelled_by, Some(AccountKind::Captain));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unfinished_and_listing(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Rides::new(&mut conn);

        assert!(repo.find_unfinished(RideParticipant::User(user.id)).await.unwrap().is_none());

        let ride = repo.create(&ride_request(user.id)).await.unwrap();
        assert_eq!(repo.find_unfinished(RideParticipant::User(user.id)).await.unwrap().map(|r| r.id), Some(ride.id));

        repo.apply_transition(ride.id, Transition::Cancel, Actor::User(user.id)).await.unwrap();
        assert!(repo.find_unfinished(RideParticipant::User(user.id)).await.unwrap().is_none());

        repo.create(&ride_request(user.id)).await.unwrap();

        let filter = RideFilter::new(0, 10).participant(RideParticipant::User(user.id));
        assert_eq!(repo.list(&filter).await.unwrap().len(), 2);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);
        assert_eq!(repo.count(&filter.clone().status(RideStatus::Cancelled)).await.unwrap(), 1);
        assert_eq!(repo.count_in_statuses(&[RideStatus::Pending]).await.unwrap(), 1);

        let bulk = repo.get_bulk(vec![ride.id]).await.unwrap();
        assert_eq!(bulk.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_one_unfinished_ride_per_participant(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let other_user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Auto).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Rides::new(&mut conn);

        let ride = repo.create(&ride_request(user.id)).await.unwrap();
        let err = repo.create(&ride_request(user.id)).await.unwrap_err();
        assert!(err.is_unique_on("rides", "user_id"), "unexpected error: {err:?}");

        let actor = Actor::Captain(captain.id);
        repo.apply_transition(ride.id, Transition::Confirm, actor).await.unwrap().unwrap();
        let other = repo.create(&ride_request(other_user.id)).await.unwrap();
        let err = repo.apply_transition(other.id, Transition::Confirm, actor).await.unwrap_err();
        assert!(err.is_unique_on("rides", "captain_id"), "unexpected error: {err:?}");

        // Finishing frees both slots
        repo.apply_transition(ride.id, Transition::Start, actor).await.unwrap().unwrap();
        repo.apply_transition(ride.id, Transition::Complete, actor).await.unwrap().unwrap();
        repo.create(&ride_request(user.id)).await.unwrap();
        assert!(repo.apply_transition(other.id, Transition::Confirm, actor).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_completed_between(pool: SqlitePool) {
        let user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Auto).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Rides::new(&mut conn);

        let ride = repo.create(&ride_request(user.id)).await.unwrap();
        let actor = Actor::Captain(captain.id);
        for transition in [Transition::Confirm, Transition::Start, Transition::Complete] {
            repo.apply_transition(ride.id, transition, actor).await.unwrap().unwrap();
        }

        let now = Utc::now();
        let hour = chrono::Duration::hours(1);
        let window = repo.completed_between(Some(captain.id), now - hour, now + hour).await.unwrap();
        assert_eq!(window.len(), 1);
        assert!(repo.completed_between(None, now + hour, now + hour * 2).await.unwrap().is_empty());

        let recent = repo.recent_completed_for_captain(captain.id, 5).await.unwrap();
        assert_eq!(recent.len(), 1);
    }
}
