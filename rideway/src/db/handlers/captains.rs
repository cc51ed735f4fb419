//! Database repository for captains (drivers).

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::captains::{CaptainCreateDBRequest, CaptainDBResponse, CaptainFilter, CaptainStatus, CaptainUpdateDBRequest},
};
use crate::maps::{Coordinates, haversine_km};
use crate::types::{CaptainId, VehicleType, abbrev_uuid};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct Captains<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Captains<'c> {
    type CreateRequest = CaptainCreateDBRequest;
    type UpdateRequest = CaptainUpdateDBRequest;
    type Response = CaptainDBResponse;
    type Id = CaptainId;
    type Filter = CaptainFilter;

    #[instrument(skip(self, request), fields(vehicle_type = %request.vehicle.vehicle_type), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let captain = sqlx::query_as::<_, CaptainDBResponse>(
            r#"
            INSERT INTO captains (
                id, first_name, last_name, email, phone, password_hash,
                vehicle_color, vehicle_plate, vehicle_capacity, vehicle_type,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.email.to_lowercase())
        .bind(&request.phone)
        .bind(&request.password_hash)
        .bind(&request.vehicle.color)
        .bind(&request.vehicle.plate)
        .bind(request.vehicle.capacity)
        .bind(request.vehicle.vehicle_type)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(captain)
    }

    #[instrument(skip(self), fields(captain_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let captain = sqlx::query_as::<_, CaptainDBResponse>("SELECT * FROM captains WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(captain)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<CaptainId>) -> Result<HashMap<Self::Id, CaptainDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM captains WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let captains = query.build_query_as::<CaptainDBResponse>().fetch_all(&mut *self.db).await?;

        Ok(captains.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let captains =
            sqlx::query_as::<_, CaptainDBResponse>("SELECT * FROM captains ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(captains)
    }

    #[instrument(skip(self), fields(captain_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM captains WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(captain_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let captain = sqlx::query_as::<_, CaptainDBResponse>(
            r#"
            UPDATE captains SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                phone = COALESCE(?, phone),
                password_hash = COALESCE(?, password_hash),
                vehicle_color = COALESCE(?, vehicle_color),
                vehicle_plate = COALESCE(?, vehicle_plate),
                vehicle_capacity = COALESCE(?, vehicle_capacity),
                vehicle_type = COALESCE(?, vehicle_type),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.phone)
        .bind(&request.password_hash)
        .bind(&request.vehicle_color)
        .bind(&request.vehicle_plate)
        .bind(request.vehicle_capacity)
        .bind(request.vehicle_type)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(captain)
    }
}

impl<'c> Captains<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<CaptainDBResponse>> {
        let captain = sqlx::query_as::<_, CaptainDBResponse>("SELECT * FROM captains WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(captain)
    }

    #[instrument(skip(self), fields(captain_id = %abbrev_uuid(&id)), err)]
    pub async fn set_status(&mut self, id: CaptainId, status: CaptainStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE captains SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, location), fields(captain_id = %abbrev_uuid(&id)), err)]
    pub async fn update_location(&mut self, id: CaptainId, location: Coordinates) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE captains SET latitude = ?, longitude = ?, location_updated_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(location.ltd)
        .bind(location.lng)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip `is_blocked`, returning the updated row.
    #[instrument(skip(self), fields(captain_id = %abbrev_uuid(&id)), err)]
    pub async fn toggle_block(&mut self, id: CaptainId) -> Result<Option<CaptainDBResponse>> {
        let captain = sqlx::query_as::<_, CaptainDBResponse>(
            "UPDATE captains SET is_blocked = NOT is_blocked, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(captain)
    }

    /// Active, unblocked captains driving `vehicle_type` whose last known position is within
    /// `radius_km` of `center`, nearest first.
    #[instrument(skip(self, center), err)]
    pub async fn find_available_near(
        &mut self,
        vehicle_type: VehicleType,
        center: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<CaptainDBResponse>> {
        let candidates = sqlx::query_as::<_, CaptainDBResponse>(
            r#"
            SELECT * FROM captains
            WHERE vehicle_type = ?
              AND status = 'active'
              AND is_blocked = FALSE
              AND latitude IS NOT NULL
              AND longitude IS NOT NULL
            "#,
        )
        .bind(vehicle_type)
        .fetch_all(&mut *self.db)
        .await?;

        let mut nearby: Vec<(f64, CaptainDBResponse)> = candidates
            .into_iter()
            .filter_map(|captain| {
                let (ltd, lng) = captain.location()?;
                let distance = haversine_km(center, Coordinates { ltd, lng });
                (distance <= radius_km).then_some((distance, captain))
            })
            .collect();
        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(nearby.into_iter().map(|(_, captain)| captain).collect())
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM captains")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
