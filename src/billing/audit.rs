use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use super::error::BillingError;
use crate::models::OrderStatus;

/// Appends a lifecycle entry to the audit log inside the caller's
/// transaction, so the trail commits or rolls back together with the
/// transition it describes.
pub(crate) async fn record_transition(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: Uuid,
    action: &str,
    from: OrderStatus,
    to: OrderStatus,
    reference: Option<&str>,
) -> Result<(), BillingError> {
    sqlx::query(
        "INSERT INTO audit_log (entity_type, entity_id, action, status_before, status_after, \
         reference, created_at) VALUES ('order', ?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(order_id)
    .bind(action)
    .bind(from)
    .bind(to)
    .bind(reference)
    .bind(Utc::now())
    .execute(tx.as_mut())
    .await?;

    Ok(())
}
