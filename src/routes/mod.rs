use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers;
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/billing/checkout", post(handlers::create_checkout))
        .route("/billing/webhook", post(handlers::payment_webhook))
        .route("/billing/orders/:order_id", get(handlers::get_order))
        .route(
            "/billing/orders/:order_id/complete",
            post(handlers::complete_order),
        )
        .route(
            "/billing/orders/:order_id/cancel",
            post(handlers::cancel_order),
        )
        .route(
            "/billing/orders/:order_id/refund",
            post(handlers::refund_order),
        )
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
