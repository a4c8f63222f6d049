use thiserror::Error;
use uuid::Uuid;

use crate::models::OrderStatus;
use crate::payments::ProviderError;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("edition {0} not found")]
    EditionNotFound(Uuid),

    #[error("ticket type {0} not found")]
    TicketTypeNotFound(Uuid),

    #[error("ticket type {0} is sold out")]
    SoldOut(Uuid),

    #[error("cannot {action} order {order_id} while {status}")]
    InvalidTransition {
        order_id: Uuid,
        status: OrderStatus,
        action: &'static str,
    },

    #[error("invalid cart: {0}")]
    InvalidCart(String),

    #[error("document sequence unavailable for organization {organization_id}")]
    Sequence {
        organization_id: Uuid,
        #[source]
        source: sqlx::Error,
    },

    #[error("payment provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}
