//! Dummy payment provider implementation
//!
//! Orders are minted locally and signatures use the configured secret, so the whole checkout
//! flow can be exercised without network access. Useful for testing and development purposes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::DummyPaymentConfig;
use crate::payment_providers::{Order, OrderRequest, PaymentError, PaymentProvider, Result, signing};

pub struct DummyProvider {
    key_secret: String,
}

impl From<DummyPaymentConfig> for DummyProvider {
    fn from(config: DummyPaymentConfig) -> Self {
        Self {
            key_secret: config.key_secret,
        }
    }
}

impl DummyProvider {
    /// Signature a real checkout would return for this order and payment.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        signing::sign_payment(order_id, payment_id, &self.key_secret)
    }
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        if request.amount <= 0 {
            return Err(PaymentError::InvalidData("Amount must be positive".to_string()));
        }

        let order = Order {
            id: format!("order_dummy_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: request.receipt.clone(),
            status: "created".to_string(),
        };
        tracing::info!("Dummy provider created order {}", order.id);

        Ok(order)
    }

    fn verify_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        signing::verify_payment_signature(order_id, payment_id, signature, &self.key_secret)
    }
}
