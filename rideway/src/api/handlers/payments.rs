use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::payments::{CreateOrderRequest, VerifyOrderRequest, VerifyOrderResponse},
    auth::current_user::CurrentUser,
    db::{
        handlers::{Payments, Rides},
        models::payments::PaymentCreateDBRequest,
    },
    errors::{Error, Result},
    payment_providers::{Order, OrderRequest},
    realtime::{ServerEvent, messages::PaymentSuccessPayload},
    rides::lifecycle::RideStatus,
    types::{AccountKind, abbrev_uuid},
};

/// Open a checkout order with the payment provider
#[utoipa::path(
    post,
    path = "/payment/create-order",
    request_body = CreateOrderRequest,
    tag = "payments",
    responses(
        (status = 200, description = "Order created", body = Order),
        (status = 400, description = "Invalid amount or currency"),
        (status = 404, description = "Ride not found or not completed"),
        (status = 502, description = "Payment provider unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_order(State(state): State<AppState>, current: CurrentUser, Json(request): Json<CreateOrderRequest>) -> Result<Json<Order>> {
    let order = request.validate(&state.config.rides.currency)?;

    if let Some(ride_id) = order.ride_id {
        let mut conn = state.db.acquire().await?;
        let ride = Rides::new(&mut conn).get_by_id(ride_id).await?;
        let Some(ride) = ride.filter(|r| r.user_id == current.user.id && r.status == RideStatus::Completed) else {
            return Err(Error::NotFound {
                message: "Ride not found or not completed".to_string(),
            });
        };

        // A ride order settles the ride, so it must be for exactly the fare
        let currency = &state.config.rides.currency;
        if ride.fare.checked_mul(100) != Some(order.amount) || !order.currency.eq_ignore_ascii_case(currency) {
            return Err(Error::BadRequest {
                message: format!("Amount must equal the ride fare of {} {}", ride.fare, currency),
            });
        }
    }

    let provider_order = state
        .payments
        .create_order(&OrderRequest {
            amount: order.amount,
            currency: order.currency.clone(),
            receipt: order.receipt.clone(),
        })
        .await?;

    let mut conn = state.db.acquire().await?;
    Payments::new(&mut conn)
        .create(&PaymentCreateDBRequest {
            order_id: provider_order.id.clone(),
            user_id: current.user.id,
            ride_id: order.ride_id,
            amount: provider_order.amount,
            currency: provider_order.currency.clone(),
            receipt: provider_order.receipt.clone(),
        })
        .await?;

    tracing::info!(
        "Created order {} for user {} ({} {})",
        provider_order.id,
        abbrev_uuid(&current.user.id),
        provider_order.amount,
        provider_order.currency
    );
    Ok(Json(provider_order))
}

/// Check the signature returned by checkout and record the payment
#[utoipa::path(
    post,
    path = "/payment/verify-order",
    request_body = VerifyOrderRequest,
    tag = "payments",
    responses(
        (status = 200, description = "Payment verified", body = VerifyOrderResponse),
        (status = 400, description = "Invalid signature", body = VerifyOrderResponse),
        (status = 404, description = "Order not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_order(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<VerifyOrderRequest>,
) -> Result<(StatusCode, Json<VerifyOrderResponse>)> {
    request.validate()?;
    let order_id = request.razorpay_order_id.trim();
    let payment_id = request.razorpay_payment_id.trim();

    if !state.payments.verify_payment(order_id, payment_id, request.razorpay_signature.trim()) {
        tracing::warn!("Rejected payment signature for order {}", order_id);
        metrics::counter!("rideway_payments_verified_total", "outcome" => "invalid").increment(1);
        return Ok((StatusCode::BAD_REQUEST, Json(VerifyOrderResponse::failure("Invalid signature"))));
    }

    let mut tx = state.db.begin().await?;
    let payment = Payments::new(&mut tx)
        .get_by_order_id(order_id)
        .await?
        .filter(|p| p.user_id == current.user.id)
        .ok_or_else(|| Error::not_found("Order"))?;

    Payments::new(&mut tx).mark_paid(order_id, payment_id).await?;
    let ride = match payment.ride_id {
        Some(ride_id) => {
            Rides::new(&mut tx).mark_paid(ride_id).await?;
            Rides::new(&mut tx).get_by_id(ride_id).await?
        }
        None => None,
    };
    tx.commit().await?;

    if let Some(ride) = &ride
        && let Some(captain_id) = ride.captain_id
    {
        let event = ServerEvent::PaymentSuccess(PaymentSuccessPayload { ride_id: ride.id });
        state.hub.send(AccountKind::Captain, captain_id, &event);
    }

    metrics::counter!("rideway_payments_verified_total", "outcome" => "success").increment(1);
    tracing::info!("Verified payment {} for order {}", payment_id, order_id);
    Ok((StatusCode::OK, Json(VerifyOrderResponse::success())))
}
