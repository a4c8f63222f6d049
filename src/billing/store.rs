//! Row access shared by checkout, the order lifecycle and the HTTP handlers.
//! Every function takes a generic executor so it runs equally well on the
//! pool or inside an open transaction.

use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::models::{Edition, Order, OrderItem, Ticket, TicketType};

pub(crate) async fn fetch_order<'e, E>(ex: E, order_id: Uuid) -> Result<Option<Order>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Order>(
        "SELECT id, edition_id, buyer_name, buyer_email, status, total_amount, currency, \
         invoice_number, credit_note_number, payment_ref, paid_at, created_at \
         FROM orders WHERE id = ?1",
    )
    .bind(order_id)
    .fetch_optional(ex)
    .await
}

pub(crate) async fn fetch_order_items<'e, E>(
    ex: E,
    order_id: Uuid,
) -> Result<Vec<OrderItem>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, ticket_type_id, quantity, unit_price \
         FROM order_items WHERE order_id = ?1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(ex)
    .await
}

pub(crate) async fn fetch_order_tickets<'e, E>(
    ex: E,
    order_id: Uuid,
) -> Result<Vec<Ticket>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Ticket>(
        "SELECT id, order_id, ticket_type_id, ticket_number, status, attendee_name, \
         attendee_email, checked_in_at, created_at \
         FROM tickets WHERE order_id = ?1 ORDER BY ticket_number",
    )
    .bind(order_id)
    .fetch_all(ex)
    .await
}

pub(crate) async fn fetch_edition<'e, E>(
    ex: E,
    edition_id: Uuid,
) -> Result<Option<Edition>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Edition>(
        "SELECT id, organization_id, name, currency, created_at FROM editions WHERE id = ?1",
    )
    .bind(edition_id)
    .fetch_optional(ex)
    .await
}

pub(crate) async fn fetch_ticket_type<'e, E>(
    ex: E,
    ticket_type_id: Uuid,
) -> Result<Option<TicketType>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, TicketType>(
        "SELECT id, edition_id, name, price, quantity, quantity_sold, created_at \
         FROM ticket_types WHERE id = ?1",
    )
    .bind(ticket_type_id)
    .fetch_optional(ex)
    .await
}

/// Looks up the owning organization through the edition. The sequence
/// counters are scoped per organization, not per edition.
pub(crate) async fn organization_for_edition<'e, E>(
    ex: E,
    edition_id: Uuid,
) -> Result<Option<Uuid>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar::<_, Uuid>("SELECT organization_id FROM editions WHERE id = ?1")
        .bind(edition_id)
        .fetch_optional(ex)
        .await
}

pub(crate) async fn insert_order<'e, E>(ex: E, order: &Order) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO orders (id, edition_id, buyer_name, buyer_email, status, total_amount, \
         currency, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(order.id)
    .bind(order.edition_id)
    .bind(&order.buyer_name)
    .bind(&order.buyer_email)
    .bind(order.status)
    .bind(order.total_amount)
    .bind(&order.currency)
    .bind(order.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub(crate) async fn insert_order_item<'e, E>(
    ex: E,
    order_id: Uuid,
    ticket_type_id: Uuid,
    quantity: i64,
    unit_price: i64,
) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO order_items (order_id, ticket_type_id, quantity, unit_price) \
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(order_id)
    .bind(ticket_type_id)
    .bind(quantity)
    .bind(unit_price)
    .execute(ex)
    .await?;

    Ok(())
}
