use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use super::audit;
use super::error::BillingError;
use super::inventory;
use super::sequence::{self, DocumentKind};
use super::store;
use super::tickets;
use crate::models::{Order, OrderStatus, Ticket};
use crate::notify::NotificationSink;
use crate::payments::PaymentProvider;

/// A paid order together with the tickets that admit its units.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedOrder {
    pub order: Order,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// This call performed the transition.
    Completed(CompletedOrder),
    /// A previous call already paid the order; the stored result is returned
    /// unchanged so webhook redeliveries and double-submits stay harmless.
    AlreadyPaid(CompletedOrder),
}

impl CompletionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            CompletionOutcome::Completed(completed)
            | CompletionOutcome::AlreadyPaid(completed) => &completed.order,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Cancelled(Order),
    AlreadyCancelled(Order),
}

/// Drives every order status change. Each transition runs in one database
/// transaction whose first statement is the status claim, so concurrent
/// attempts serialize on the order row and at most one performs the work;
/// everyone else observes a consistent before or after state.
#[derive(Clone)]
pub struct OrderLifecycle {
    pool: SqlitePool,
    provider: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn NotificationSink>,
}

impl OrderLifecycle {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pool,
            provider,
            notifier,
        }
    }

    /// Settles a pending order after payment confirmation (or on an
    /// operator's say-so for offline payments): reserves inventory, issues
    /// tickets, mints the invoice number and flips the status, all
    /// atomically. Free orders get tickets but no invoice.
    pub async fn complete(
        &self,
        order_id: Uuid,
        payment_ref: Option<&str>,
    ) -> Result<CompletionOutcome, BillingError> {
        let mut tx = self.pool.begin().await?;

        if !claim(&mut tx, order_id, OrderStatus::Pending, OrderStatus::Paid).await? {
            let order = store::fetch_order(tx.as_mut(), order_id)
                .await?
                .ok_or(BillingError::OrderNotFound(order_id))?;

            return match order.status {
                OrderStatus::Paid => {
                    let tickets = store::fetch_order_tickets(tx.as_mut(), order_id).await?;
                    tx.rollback().await?;
                    info!(%order_id, "order already completed, returning stored result");
                    Ok(CompletionOutcome::AlreadyPaid(CompletedOrder {
                        order,
                        tickets,
                    }))
                }
                status => Err(BillingError::InvalidTransition {
                    order_id,
                    status,
                    action: "complete",
                }),
            };
        }

        let mut order = store::fetch_order(tx.as_mut(), order_id)
            .await?
            .ok_or(BillingError::OrderNotFound(order_id))?;
        let items = store::fetch_order_items(tx.as_mut(), order_id).await?;

        for item in &items {
            inventory::reserve(&mut tx, item.ticket_type_id, item.quantity).await?;
        }

        let issued = tickets::issue(&mut tx, &order, &items).await?;

        let invoice_number = if order.is_free() {
            None
        } else {
            let organization_id = store::organization_for_edition(tx.as_mut(), order.edition_id)
                .await?
                .ok_or(BillingError::EditionNotFound(order.edition_id))?;
            Some(
                sequence::next_document_number(&mut tx, organization_id, DocumentKind::Invoice)
                    .await?,
            )
        };

        let paid_at = Utc::now();
        sqlx::query(
            "UPDATE orders SET paid_at = ?1, invoice_number = ?2, \
             payment_ref = COALESCE(?3, payment_ref) WHERE id = ?4",
        )
        .bind(paid_at)
        .bind(&invoice_number)
        .bind(payment_ref)
        .bind(order_id)
        .execute(tx.as_mut())
        .await?;

        audit::record_transition(
            &mut tx,
            order_id,
            "complete",
            OrderStatus::Pending,
            OrderStatus::Paid,
            invoice_number.as_deref(),
        )
        .await?;

        tx.commit().await?;

        order.status = OrderStatus::Paid;
        order.paid_at = Some(paid_at);
        order.invoice_number = invoice_number;
        if let Some(reference) = payment_ref {
            order.payment_ref = Some(reference.to_string());
        }

        info!(
            order_id = %order.id,
            invoice = order.invoice_number.as_deref().unwrap_or("-"),
            tickets = issued.len(),
            "order completed"
        );

        if let Err(err) = self.notifier.order_completed(&order).await {
            warn!(order_id = %order.id, error = %err, "confirmation notification failed");
        }

        Ok(CompletionOutcome::Completed(CompletedOrder {
            order,
            tickets: issued,
        }))
    }

    /// Cancels an order. Pending orders hold no inventory and have no
    /// tickets, so the status flip is the whole story; paid orders release
    /// their units and void their tickets. Cancelled is terminal, and a
    /// repeated cancel is a no-op rather than an error.
    pub async fn cancel(&self, order_id: Uuid) -> Result<CancelOutcome, BillingError> {
        let mut tx = self.pool.begin().await?;

        if claim(
            &mut tx,
            order_id,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
        )
        .await?
        {
            audit::record_transition(
                &mut tx,
                order_id,
                "cancel",
                OrderStatus::Pending,
                OrderStatus::Cancelled,
                None,
            )
            .await?;
            let order = store::fetch_order(tx.as_mut(), order_id)
                .await?
                .ok_or(BillingError::OrderNotFound(order_id))?;
            tx.commit().await?;

            info!(%order_id, "pending order cancelled");
            return Ok(CancelOutcome::Cancelled(order));
        }

        if claim(&mut tx, order_id, OrderStatus::Paid, OrderStatus::Cancelled).await? {
            let items = store::fetch_order_items(tx.as_mut(), order_id).await?;
            for item in &items {
                inventory::release(&mut tx, item.ticket_type_id, item.quantity).await?;
            }
            let voided = tickets::cancel_for_order(&mut tx, order_id).await?;
            audit::record_transition(
                &mut tx,
                order_id,
                "cancel",
                OrderStatus::Paid,
                OrderStatus::Cancelled,
                None,
            )
            .await?;
            let order = store::fetch_order(tx.as_mut(), order_id)
                .await?
                .ok_or(BillingError::OrderNotFound(order_id))?;
            tx.commit().await?;

            info!(%order_id, tickets_voided = voided, "paid order cancelled, inventory released");
            return Ok(CancelOutcome::Cancelled(order));
        }

        let order = store::fetch_order(tx.as_mut(), order_id)
            .await?
            .ok_or(BillingError::OrderNotFound(order_id))?;

        match order.status {
            OrderStatus::Cancelled => {
                tx.rollback().await?;
                Ok(CancelOutcome::AlreadyCancelled(order))
            }
            status => Err(BillingError::InvalidTransition {
                order_id,
                status,
                action: "cancel",
            }),
        }
    }

    /// Refunds a paid order: releases inventory, voids tickets and mints a
    /// credit note from the same per-organization sequence machinery as
    /// invoices. The original invoice number stays on the order; it is never
    /// reused. The provider call happens inside the open transaction, so a
    /// failed refund instruction leaves the order paid.
    pub async fn refund(&self, order_id: Uuid) -> Result<Order, BillingError> {
        let mut tx = self.pool.begin().await?;

        if !claim(&mut tx, order_id, OrderStatus::Paid, OrderStatus::Refunded).await? {
            let order = store::fetch_order(tx.as_mut(), order_id)
                .await?
                .ok_or(BillingError::OrderNotFound(order_id))?;

            return Err(BillingError::InvalidTransition {
                order_id,
                status: order.status,
                action: "refund",
            });
        }

        let mut order = store::fetch_order(tx.as_mut(), order_id)
            .await?
            .ok_or(BillingError::OrderNotFound(order_id))?;
        let items = store::fetch_order_items(tx.as_mut(), order_id).await?;

        for item in &items {
            inventory::release(&mut tx, item.ticket_type_id, item.quantity).await?;
        }
        let voided = tickets::cancel_for_order(&mut tx, order_id).await?;

        let credit_note_number = if order.is_free() {
            None
        } else {
            let organization_id = store::organization_for_edition(tx.as_mut(), order.edition_id)
                .await?
                .ok_or(BillingError::EditionNotFound(order.edition_id))?;
            Some(
                sequence::next_document_number(&mut tx, organization_id, DocumentKind::CreditNote)
                    .await?,
            )
        };

        if let Some(number) = &credit_note_number {
            sqlx::query("UPDATE orders SET credit_note_number = ?1 WHERE id = ?2")
                .bind(number)
                .bind(order_id)
                .execute(tx.as_mut())
                .await?;
        }

        let reference = match (&credit_note_number, &order.invoice_number) {
            (Some(credit), Some(invoice)) => Some(format!("{credit} reverses {invoice}")),
            (Some(credit), None) => Some(credit.clone()),
            (None, _) => None,
        };
        audit::record_transition(
            &mut tx,
            order_id,
            "refund",
            OrderStatus::Paid,
            OrderStatus::Refunded,
            reference.as_deref(),
        )
        .await?;

        // Instruct the provider last, while the transaction is still open: if
        // the call fails, everything above rolls back and the order stays
        // paid for a later retry.
        match order.payment_ref.as_deref() {
            Some(payment_ref) if !order.is_free() => {
                self.provider.refund(payment_ref).await?;
            }
            _ => info!(%order_id, "refund recorded without provider instruction"),
        }

        tx.commit().await?;

        order.status = OrderStatus::Refunded;
        order.credit_note_number = credit_note_number;

        info!(
            order_id = %order.id,
            credit_note = order.credit_note_number.as_deref().unwrap_or("-"),
            tickets_voided = voided,
            "order refunded"
        );

        Ok(order)
    }
}

/// Compare-and-set on the status column. Returns whether this transaction
/// performed the transition; `false` means another writer got there first or
/// the order does not exist. Running this as the first statement makes the
/// order row the serialization point for the whole transition.
async fn claim(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool, BillingError> {
    debug_assert!(
        from.can_transition_to(to),
        "illegal transition {from} -> {to}"
    );

    let result = sqlx::query("UPDATE orders SET status = ?1 WHERE id = ?2 AND status = ?3")
        .bind(to)
        .bind(order_id)
        .bind(from)
        .execute(tx.as_mut())
        .await?;

    Ok(result.rows_affected() == 1)
}
