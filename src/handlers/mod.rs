use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::billing::{
    checkout, store, BillingError, CancelOutcome, CheckoutRequest, CompletionOutcome,
};
use crate::models::{Order, OrderItem, Ticket};
use crate::payments::WebhookEventKind;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "tessera-billing-api",
    };

    success(payload, "Health check successful").into_response()
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Response, AppError> {
    let outcome = checkout::create_order(
        &state.pool,
        state.provider.as_ref(),
        &state.checkout_urls,
        request,
    )
    .await?;

    Ok(created(outcome, "Order created").into_response())
}

#[derive(Serialize)]
struct OrderView {
    order: Order,
    items: Vec<OrderItem>,
    tickets: Vec<Ticket>,
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = store::fetch_order(&state.pool, order_id)
        .await
        .map_err(BillingError::from)?
        .ok_or(BillingError::OrderNotFound(order_id))?;
    let items = store::fetch_order_items(&state.pool, order_id)
        .await
        .map_err(BillingError::from)?;
    let tickets = store::fetch_order_tickets(&state.pool, order_id)
        .await
        .map_err(BillingError::from)?;

    Ok(success(
        OrderView {
            order,
            items,
            tickets,
        },
        "Order retrieved",
    )
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteOrderBody {
    pub payment_ref: Option<String>,
}

/// Manual completion for offline payments (bank transfer, box office cash).
pub async fn complete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    body: Option<Json<CompleteOrderBody>>,
) -> Result<Response, AppError> {
    let payment_ref = body.and_then(|Json(body)| body.payment_ref);

    match state
        .lifecycle()
        .complete(order_id, payment_ref.as_deref())
        .await?
    {
        CompletionOutcome::Completed(completed) => {
            Ok(success(completed, "Order completed").into_response())
        }
        CompletionOutcome::AlreadyPaid(completed) => {
            Ok(success(completed, "Order was already completed").into_response())
        }
    }
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    match state.lifecycle().cancel(order_id).await? {
        CancelOutcome::Cancelled(order) => Ok(success(order, "Order cancelled").into_response()),
        CancelOutcome::AlreadyCancelled(order) => {
            Ok(success(order, "Order was already cancelled").into_response())
        }
    }
}

pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = state.lifecycle().refund(order_id).await?;
    Ok(success(order, "Order refunded").into_response())
}

#[derive(Serialize)]
struct WebhookAck {
    received: bool,
    outcome: &'static str,
}

impl WebhookAck {
    fn with(outcome: &'static str) -> Self {
        Self {
            received: true,
            outcome,
        }
    }
}

/// Entry point for provider deliveries. The signature is checked against the
/// raw body before anything else happens; only then is the payload parsed and
/// acted on. Deliveries are at-least-once, so the underlying transitions
/// tolerate replays, and event types we do not handle are acknowledged
/// without side effects.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::ValidationError("missing Stripe-Signature header".to_string()))?;

    let event = state
        .provider
        .construct_webhook_event(&body, signature, &state.webhook_secret)
        .await?;

    match event.kind {
        WebhookEventKind::CheckoutCompleted => {
            let order_id = required_order_id(event.order_id)?;
            match state
                .lifecycle()
                .complete(order_id, event.payment_ref.as_deref())
                .await?
            {
                CompletionOutcome::Completed(_) => {
                    Ok(success(WebhookAck::with("completed"), "Webhook processed").into_response())
                }
                CompletionOutcome::AlreadyPaid(_) => Ok(success(
                    WebhookAck::with("already_completed"),
                    "Webhook processed",
                )
                .into_response()),
            }
        }
        WebhookEventKind::CheckoutExpired => {
            let order_id = required_order_id(event.order_id)?;
            match state.lifecycle().cancel(order_id).await? {
                CancelOutcome::Cancelled(_) => {
                    Ok(success(WebhookAck::with("cancelled"), "Webhook processed").into_response())
                }
                CancelOutcome::AlreadyCancelled(_) => Ok(success(
                    WebhookAck::with("already_cancelled"),
                    "Webhook processed",
                )
                .into_response()),
            }
        }
        WebhookEventKind::Unhandled(kind) => {
            info!(event_type = %kind, "ignoring unhandled webhook event");
            Ok(success(WebhookAck::with("ignored"), "Event ignored").into_response())
        }
    }
}

fn required_order_id(order_id: Option<Uuid>) -> Result<Uuid, AppError> {
    order_id.ok_or_else(|| AppError::ValidationError("event carries no order id".to_string()))
}
