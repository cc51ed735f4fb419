//! Payment provider abstraction layer
//!
//! A rider pays through the provider's hosted checkout. The backend only creates the order up
//! front and afterwards verifies the signature the checkout hands back.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::PaymentConfig;
use crate::errors::Error;

pub mod dummy;
pub mod razorpay;
pub mod signing;

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
pub fn create_provider(config: PaymentConfig) -> anyhow::Result<Box<dyn PaymentProvider>> {
    Ok(match config {
        PaymentConfig::Razorpay(razorpay_config) => Box::new(razorpay::RazorpayProvider::new(razorpay_config)?),
        PaymentConfig::Dummy(dummy_config) => Box::new(dummy::DummyProvider::from(dummy_config)),
    })
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),
}

impl From<PaymentError> for Error {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidData(message) => Error::BadRequest { message },
            PaymentError::ProviderApi(message) => Error::Upstream {
                service: "payment".to_string(),
                message,
            },
        }
    }
}

/// Convert a decimal amount in major currency units to minor units (paise, cents).
///
/// Returns `None` for non-positive amounts and for amounts with sub-minor-unit precision.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount <= Decimal::ZERO {
        return None;
    }
    let minor = amount * Decimal::ONE_HUNDRED;
    if minor.fract() != Decimal::ZERO {
        return None;
    }
    minor.to_i64()
}

/// Order to be created with the provider
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
}

/// An order as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create an order the client can open a checkout for.
    async fn create_order(&self, request: &OrderRequest) -> Result<Order>;

    /// Check the signature returned by the checkout for `(order_id, payment_id)`.
    fn verify_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::from_str("193").unwrap()), Some(19_300));
        assert_eq!(to_minor_units(Decimal::from_str("19.99").unwrap()), Some(1_999));
        assert_eq!(to_minor_units(Decimal::from_str("0.5").unwrap()), Some(50));
        assert_eq!(to_minor_units(Decimal::from_str("0").unwrap()), None);
        assert_eq!(to_minor_units(Decimal::from_str("-5").unwrap()), None);
        assert_eq!(to_minor_units(Decimal::from_str("1.005").unwrap()), None);
    }

    #[test]
    fn test_error_mapping() {
        use axum::http::StatusCode;
        let err: Error = PaymentError::InvalidData("bad".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err: Error = PaymentError::ProviderApi("502".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
