//! Boundary to the hosted payment provider. The billing flow only ever talks
//! to the `PaymentProvider` trait; the wire format below follows the
//! Stripe-checkout shape (`type`, `data.object`, `metadata.order_id`).

pub mod mock;
pub mod signature;

pub use mock::MockPaymentProvider;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("webhook signature rejected")]
    SignatureInvalid,

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("provider call failed: {0}")]
    Call(String),
}

/// Event types the billing flow reacts to. Everything else passes through as
/// `Unhandled` and is acknowledged without side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    CheckoutCompleted,
    CheckoutExpired,
    Unhandled(String),
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub kind: WebhookEventKind,
    pub order_id: Option<Uuid>,
    pub payment_ref: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a hosted checkout session for the order and returns the URL
    /// the buyer is redirected to.
    async fn create_checkout(
        &self,
        order: &Order,
        items: &[OrderItem],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, ProviderError>;

    /// Verifies the webhook signature and parses the payload into a typed
    /// event. Nothing in the payload may be trusted before this succeeds.
    async fn construct_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<WebhookEvent, ProviderError>;

    /// Instructs the provider to return the captured amount for a payment.
    async fn refund(&self, payment_ref: &str) -> Result<(), ProviderError>;
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    object: RawObject,
}

#[derive(Deserialize)]
struct RawObject {
    id: Option<String>,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Deserialize, Default)]
struct RawMetadata {
    order_id: Option<String>,
}

/// Parses a verified payload. Events we act on must carry our order id in
/// their metadata; unhandled event types are passed through untyped.
pub(crate) fn parse_event(payload: &[u8]) -> Result<WebhookEvent, ProviderError> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|err| ProviderError::MalformedPayload(err.to_string()))?;

    let kind = match raw.kind.as_str() {
        "checkout.session.completed" => WebhookEventKind::CheckoutCompleted,
        "checkout.session.expired" => WebhookEventKind::CheckoutExpired,
        other => WebhookEventKind::Unhandled(other.to_string()),
    };

    let order_id = match (&kind, raw.data.object.metadata.order_id.as_deref()) {
        (WebhookEventKind::Unhandled(_), _) => None,
        (_, Some(raw_id)) => Some(Uuid::parse_str(raw_id).map_err(|_| {
            ProviderError::MalformedPayload(format!("metadata.order_id is not a UUID: {raw_id}"))
        })?),
        (_, None) => {
            return Err(ProviderError::MalformedPayload(
                "missing metadata.order_id".to_string(),
            ))
        }
    };

    let payment_ref = raw.data.object.payment_intent.or(raw.data.object.id);

    Ok(WebhookEvent {
        kind,
        order_id,
        payment_ref,
    })
}
