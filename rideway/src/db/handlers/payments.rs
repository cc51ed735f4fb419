//! Database repository for payment orders.

use crate::db::{
    errors::Result,
    models::payments::{PaymentCreateDBRequest, PaymentDBResponse},
};
use crate::types::abbrev_uuid;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Payments<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Payments<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), order_id = %request.order_id), err)]
    pub async fn create(&mut self, request: &PaymentCreateDBRequest) -> Result<PaymentDBResponse> {
        let now = Utc::now();
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            INSERT INTO payments (id, order_id, user_id, ride_id, amount, currency, receipt, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.order_id)
        .bind(request.user_id)
        .bind(request.ride_id)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(&request.receipt)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(payment)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_order_id(&mut self, order_id: &str) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>("SELECT * FROM payments WHERE order_id = ?")
            .bind(order_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(payment)
    }

    /// Record a verified capture. Re-verifying an already paid order keeps the first payment id.
    #[instrument(skip(self), err)]
    pub async fn mark_paid(&mut self, order_id: &str, payment_id: &str) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            UPDATE payments SET
                status = 'paid',
                payment_id = COALESCE(payment_id, ?),
                updated_at = ?
            WHERE order_id = ?
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(Utc::now())
        .bind(order_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(payment)
    }
}
