//! API request/response models for checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::validation::Validator;
use crate::errors::Result;
use crate::payment_providers::to_minor_units;
use crate::types::RideId;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Decimal currency units, e.g. `193` or `19.99`
    #[schema(value_type = Option<f64>)]
    pub amount: Option<Decimal>,
    /// Defaults to the configured ride currency
    pub currency: Option<String>,
    pub receipt: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub ride_id: Option<RideId>,
}

/// A validated order request
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub ride_id: Option<RideId>,
}

impl CreateOrderRequest {
    pub fn validate(&self, default_currency: &str) -> Result<NewOrder> {
        let amount = self.amount.and_then(to_minor_units);
        let currency = self
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(default_currency)
            .to_uppercase();

        Validator::body()
            .check(
                amount.is_some(),
                "amount",
                "Amount must be a positive value with at most two decimal places",
            )
            .check(
                currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_alphabetic()),
                "currency",
                "Currency must be a three letter code",
            )
            .finish()?;

        Ok(NewOrder {
            amount: amount.unwrap_or_default(),
            currency,
            receipt: self.receipt.clone().filter(|r| !r.trim().is_empty()),
            ride_id: self.ride_id,
        })
    }
}

/// Fields returned by the checkout widget
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct VerifyOrderRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

impl VerifyOrderRequest {
    pub fn validate(&self) -> Result<()> {
        Validator::body()
            .check(
                !self.razorpay_order_id.trim().is_empty(),
                "razorpay_order_id",
                "Order id is required",
            )
            .check(
                !self.razorpay_payment_id.trim().is_empty(),
                "razorpay_payment_id",
                "Payment id is required",
            )
            .check(
                !self.razorpay_signature.trim().is_empty(),
                "razorpay_signature",
                "Signature is required",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyOrderResponse {
    /// `success` or `failure`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyOrderResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: "failure".to_string(),
            message: Some(message.into()),
        }
    }
}
