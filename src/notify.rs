use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::models::Order;

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound buyer notifications. Callers log failures and move on; a broken
/// mail pipeline must never take a paid order down with it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn order_completed(&self, order: &Order) -> Result<(), NotifyError>;
}

/// Default sink: writes the confirmation to the log. Deployments that send
/// mail swap in an SMTP-backed sink.
pub struct LogNotifier;

impl LogNotifier {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn order_completed(&self, order: &Order) -> Result<(), NotifyError> {
        info!(
            order_id = %order.id,
            buyer = %order.buyer_email,
            invoice = order.invoice_number.as_deref().unwrap_or("-"),
            "order confirmation"
        );
        Ok(())
    }
}
