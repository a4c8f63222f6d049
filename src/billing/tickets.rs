use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use super::error::BillingError;
use crate::models::{Order, OrderItem, Ticket, TicketStatus};

/// Mints one ticket per purchased unit, addressed to the buyer until
/// attendees are reassigned. Ticket numbers piggyback on fresh UUIDs, which
/// keeps them unique without another counter; scanners treat them as opaque.
pub(crate) async fn issue(
    tx: &mut Transaction<'_, Sqlite>,
    order: &Order,
    items: &[OrderItem],
) -> Result<Vec<Ticket>, BillingError> {
    let mut tickets = Vec::new();

    for item in items {
        for _ in 0..item.quantity {
            let ticket = Ticket {
                id: Uuid::new_v4(),
                order_id: order.id,
                ticket_type_id: item.ticket_type_id,
                ticket_number: format!("TKT-{}", Uuid::new_v4().simple()),
                status: TicketStatus::Valid,
                attendee_name: order.buyer_name.clone(),
                attendee_email: Some(order.buyer_email.clone()),
                checked_in_at: None,
                created_at: Utc::now(),
            };

            sqlx::query(
                "INSERT INTO tickets (id, order_id, ticket_type_id, ticket_number, status, \
                 attendee_name, attendee_email, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(ticket.id)
            .bind(ticket.order_id)
            .bind(ticket.ticket_type_id)
            .bind(&ticket.ticket_number)
            .bind(ticket.status)
            .bind(&ticket.attendee_name)
            .bind(&ticket.attendee_email)
            .bind(ticket.created_at)
            .execute(tx.as_mut())
            .await?;

            tickets.push(ticket);
        }
    }

    Ok(tickets)
}

/// Marks every ticket of an order cancelled and returns how many were hit.
pub(crate) async fn cancel_for_order(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: Uuid,
) -> Result<u64, BillingError> {
    let result = sqlx::query("UPDATE tickets SET status = 'cancelled' WHERE order_id = ?1")
        .bind(order_id)
        .execute(tx.as_mut())
        .await?;

    Ok(result.rows_affected())
}
