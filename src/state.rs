use std::sync::Arc;

use sqlx::SqlitePool;

use crate::billing::{CheckoutUrls, OrderLifecycle};
use crate::notify::NotificationSink;
use crate::payments::PaymentProvider;

/// Shared application state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub provider: Arc<dyn PaymentProvider>,
    pub notifier: Arc<dyn NotificationSink>,
    pub webhook_secret: String,
    pub checkout_urls: CheckoutUrls,
}

impl AppState {
    pub fn lifecycle(&self) -> OrderLifecycle {
        OrderLifecycle::new(
            self.pool.clone(),
            self.provider.clone(),
            self.notifier.clone(),
        )
    }
}
