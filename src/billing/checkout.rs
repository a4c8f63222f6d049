use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::error::BillingError;
use super::store;
use crate::models::{Order, OrderItem, OrderStatus};
use crate::payments::PaymentProvider;

/// Hard per-line cap on units. Inventory caps are enforced at completion;
/// this bound keeps cart arithmetic within sane range regardless of what the
/// client sends.
const MAX_ITEM_QUANTITY: i64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub ticket_type_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub edition_id: Uuid,
    pub buyer_name: String,
    pub buyer_email: String,
    pub items: Vec<CartItem>,
}

/// Where the provider sends the buyer back after the hosted payment page.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success: String,
    pub cancel: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// `None` for free orders, which never visit the provider.
    pub redirect_url: Option<String>,
}

/// Persists the cart as a pending order with prices snapshotted from the
/// catalog, then asks the provider for a checkout session. Inventory is not
/// reserved here; counts are checked and taken at completion time, so an
/// abandoned cart can never strand units.
pub async fn create_order(
    pool: &SqlitePool,
    provider: &dyn PaymentProvider,
    urls: &CheckoutUrls,
    request: CheckoutRequest,
) -> Result<CheckoutOutcome, BillingError> {
    validate(&request)?;

    let mut tx = pool.begin().await?;

    let edition = store::fetch_edition(tx.as_mut(), request.edition_id)
        .await?
        .ok_or(BillingError::EditionNotFound(request.edition_id))?;

    let mut total = 0i64;
    let mut priced = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let ticket_type = store::fetch_ticket_type(tx.as_mut(), item.ticket_type_id)
            .await?
            .ok_or(BillingError::TicketTypeNotFound(item.ticket_type_id))?;
        if ticket_type.edition_id != edition.id {
            return Err(BillingError::InvalidCart(format!(
                "ticket type {} does not belong to edition {}",
                ticket_type.id, edition.id
            )));
        }
        total = ticket_type
            .price
            .checked_mul(item.quantity)
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| BillingError::InvalidCart("cart total out of range".to_string()))?;
        priced.push((item.ticket_type_id, item.quantity, ticket_type.price));
    }

    let order = Order {
        id: Uuid::new_v4(),
        edition_id: edition.id,
        buyer_name: request.buyer_name.trim().to_string(),
        buyer_email: request.buyer_email.trim().to_string(),
        status: OrderStatus::Pending,
        total_amount: total,
        currency: edition.currency.clone(),
        invoice_number: None,
        credit_note_number: None,
        payment_ref: None,
        paid_at: None,
        created_at: Utc::now(),
    };

    store::insert_order(tx.as_mut(), &order).await?;
    for (ticket_type_id, quantity, unit_price) in &priced {
        store::insert_order_item(tx.as_mut(), order.id, *ticket_type_id, *quantity, *unit_price)
            .await?;
    }

    tx.commit().await?;

    let items = store::fetch_order_items(pool, order.id).await?;

    let redirect_url = if order.is_free() {
        None
    } else {
        Some(
            provider
                .create_checkout(&order, &items, &urls.success, &urls.cancel)
                .await?,
        )
    };

    info!(
        order_id = %order.id,
        total = order.total_amount,
        currency = %order.currency,
        "order created"
    );

    Ok(CheckoutOutcome {
        order,
        items,
        redirect_url,
    })
}

fn validate(request: &CheckoutRequest) -> Result<(), BillingError> {
    if request.buyer_name.trim().is_empty() {
        return Err(BillingError::InvalidCart("buyer name is required".into()));
    }
    if request.buyer_email.trim().is_empty() || !request.buyer_email.contains('@') {
        return Err(BillingError::InvalidCart(
            "a valid buyer email is required".into(),
        ));
    }
    if request.items.is_empty() {
        return Err(BillingError::InvalidCart("cart is empty".into()));
    }
    if request.items.iter().any(|item| item.quantity < 1) {
        return Err(BillingError::InvalidCart(
            "quantities must be at least 1".into(),
        ));
    }
    if request.items.iter().any(|item| item.quantity > MAX_ITEM_QUANTITY) {
        return Err(BillingError::InvalidCart(format!(
            "quantities may not exceed {MAX_ITEM_QUANTITY} per item"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::MockPaymentProvider;
    use crate::test_utils::{seed_catalog, seed_ticket_type, setup_test_db};

    fn urls() -> CheckoutUrls {
        CheckoutUrls {
            success: "http://localhost:3000/thanks".to_string(),
            cancel: "http://localhost:3000/cart".to_string(),
        }
    }

    fn request(edition_id: Uuid, items: Vec<CartItem>) -> CheckoutRequest {
        CheckoutRequest {
            edition_id,
            buyer_name: "Grace Hopper".to_string(),
            buyer_email: "grace@example.org".to_string(),
            items,
        }
    }

    #[tokio::test]
    async fn creates_a_pending_order_with_snapshotted_prices() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let standard = seed_ticket_type(&pool, catalog.edition_id, 2500, Some(100)).await;
        let workshop = seed_ticket_type(&pool, catalog.edition_id, 9000, Some(10)).await;
        let provider = MockPaymentProvider::new();

        let outcome = create_order(
            &pool,
            &provider,
            &urls(),
            request(
                catalog.edition_id,
                vec![
                    CartItem {
                        ticket_type_id: standard,
                        quantity: 2,
                    },
                    CartItem {
                        ticket_type_id: workshop,
                        quantity: 1,
                    },
                ],
            ),
        )
        .await
        .unwrap();

        assert_eq!(outcome.order.status, OrderStatus::Pending);
        assert_eq!(outcome.order.total_amount, 2 * 2500 + 9000);
        assert_eq!(outcome.order.currency, "EUR");
        assert_eq!(outcome.items.len(), 2);
        assert!(outcome.redirect_url.is_some());

        // Catalog price edits after checkout must not touch the order.
        sqlx::query("UPDATE ticket_types SET price = 99999 WHERE id = ?1")
            .bind(standard)
            .execute(&pool)
            .await
            .unwrap();
        let items = crate::billing::store::fetch_order_items(&pool, outcome.order.id)
            .await
            .unwrap();
        let snapshot = items
            .iter()
            .find(|item| item.ticket_type_id == standard)
            .unwrap();
        assert_eq!(snapshot.unit_price, 2500);
    }

    #[tokio::test]
    async fn free_carts_skip_the_provider() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let free = seed_ticket_type(&pool, catalog.edition_id, 0, None).await;
        let provider = MockPaymentProvider::new();

        let outcome = create_order(
            &pool,
            &provider,
            &urls(),
            request(
                catalog.edition_id,
                vec![CartItem {
                    ticket_type_id: free,
                    quantity: 2,
                }],
            ),
        )
        .await
        .unwrap();

        assert_eq!(outcome.order.total_amount, 0);
        assert_eq!(outcome.redirect_url, None);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let provider = MockPaymentProvider::new();

        let err = create_order(
            &pool,
            &provider,
            &urls(),
            request(catalog.edition_id, vec![]),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BillingError::InvalidCart(_)));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let standard = seed_ticket_type(&pool, catalog.edition_id, 2500, Some(100)).await;
        let provider = MockPaymentProvider::new();

        let err = create_order(
            &pool,
            &provider,
            &urls(),
            request(
                catalog.edition_id,
                vec![CartItem {
                    ticket_type_id: standard,
                    quantity: 0,
                }],
            ),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BillingError::InvalidCart(_)));
    }

    #[tokio::test]
    async fn huge_quantity_is_rejected_rather_than_priced_as_free() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let standard = seed_ticket_type(&pool, catalog.edition_id, 2500, Some(100)).await;
        let provider = MockPaymentProvider::new();

        // 2500 * 2^62 wraps an i64 to zero; such a cart must fail validation,
        // never come out as a completable free order.
        let err = create_order(
            &pool,
            &provider,
            &urls(),
            request(
                catalog.edition_id,
                vec![CartItem {
                    ticket_type_id: standard,
                    quantity: 1 << 62,
                }],
            ),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BillingError::InvalidCart(_)));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn overflowing_total_is_rejected() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let pricey = seed_ticket_type(&pool, catalog.edition_id, i64::MAX, Some(100)).await;
        let provider = MockPaymentProvider::new();

        // Within the per-line quantity bound, so the checked multiply is what
        // has to catch this.
        let err = create_order(
            &pool,
            &provider,
            &urls(),
            request(
                catalog.edition_id,
                vec![CartItem {
                    ticket_type_id: pricey,
                    quantity: 2,
                }],
            ),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BillingError::InvalidCart(_)));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn unknown_edition_is_not_found() {
        let pool = setup_test_db().await;
        let provider = MockPaymentProvider::new();
        let missing = Uuid::new_v4();

        let err = create_order(
            &pool,
            &provider,
            &urls(),
            request(
                missing,
                vec![CartItem {
                    ticket_type_id: Uuid::new_v4(),
                    quantity: 1,
                }],
            ),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BillingError::EditionNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn foreign_ticket_type_is_rejected() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let other = seed_catalog(&pool).await;
        let foreign = seed_ticket_type(&pool, other.edition_id, 2500, Some(100)).await;
        let provider = MockPaymentProvider::new();

        let err = create_order(
            &pool,
            &provider,
            &urls(),
            request(
                catalog.edition_id,
                vec![CartItem {
                    ticket_type_id: foreign,
                    quantity: 1,
                }],
            ),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BillingError::InvalidCart(_)));

        // Nothing was persisted for the rejected cart.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
