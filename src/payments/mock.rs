use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use super::{parse_event, signature, PaymentProvider, ProviderError, WebhookEvent};
use crate::models::{Order, OrderItem};

/// Stand-in provider for development and tests. Signature verification and
/// payload parsing are the real thing; the money side is pretend. Deployments
/// that charge cards swap in an SDK-backed implementation of the same trait.
pub struct MockPaymentProvider {
    fail_refunds: bool,
    refunds: Mutex<Vec<String>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self {
            fail_refunds: false,
            refunds: Mutex::new(Vec::new()),
        }
    }

    /// Variant whose refund calls always fail, for exercising rollback paths.
    pub fn failing_refunds() -> Self {
        Self {
            fail_refunds: true,
            refunds: Mutex::new(Vec::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Payment references this provider was asked to refund, in call order.
    pub fn refund_calls(&self) -> Vec<String> {
        self.refunds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout(
        &self,
        order: &Order,
        _items: &[OrderItem],
        _success_url: &str,
        _cancel_url: &str,
    ) -> Result<String, ProviderError> {
        info!(order_id = %order.id, "issuing mock checkout session");
        Ok(format!("https://pay.invalid/session/cs_{}", order.id.simple()))
    }

    async fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<WebhookEvent, ProviderError> {
        signature::verify(payload, signature_header, secret, Utc::now().timestamp())
            .map_err(|_| ProviderError::SignatureInvalid)?;
        parse_event(payload)
    }

    async fn refund(&self, payment_ref: &str) -> Result<(), ProviderError> {
        if self.fail_refunds {
            return Err(ProviderError::Call("refund rejected by provider".to_string()));
        }

        self.refunds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(payment_ref.to_string());
        info!(payment_ref, "mock refund recorded");
        Ok(())
    }
}
