//! Shared test fixtures: in-memory database setup, catalog seeding, signed
//! webhook headers and a notifier that records deliveries.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::billing::{store, CheckoutUrls};
use crate::models::{Order, OrderStatus};
use crate::notify::{LogNotifier, NotificationSink, NotifyError};
use crate::payments::MockPaymentProvider;
use crate::state::AppState;

pub(crate) const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Serializes tests that read or mutate process environment variables; the
/// default parallel runner would otherwise let them race.
pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Creates an in-memory SQLite database with all migrations applied. The pool
/// is capped at one connection: every in-memory connection is its own
/// database, so concurrent tasks must share the single migrated one.
pub(crate) async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(":memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

/// One organization with one edition, the smallest catalog an order needs.
pub(crate) struct CatalogFixture {
    pub organization_id: Uuid,
    pub edition_id: Uuid,
}

pub(crate) async fn seed_catalog(pool: &SqlitePool) -> CatalogFixture {
    let organization_id = Uuid::new_v4();
    sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)")
        .bind(organization_id)
        .bind("Test Organization")
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();

    let edition_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO editions (id, organization_id, name, currency, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(edition_id)
    .bind(organization_id)
    .bind("Test Conference 2024")
    .bind("EUR")
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();

    CatalogFixture {
        organization_id,
        edition_id,
    }
}

/// Inserts a ticket type; `quantity: None` means unlimited capacity.
pub(crate) async fn seed_ticket_type(
    pool: &SqlitePool,
    edition_id: Uuid,
    price: i64,
    quantity: Option<i64>,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO ticket_types (id, edition_id, name, price, quantity, quantity_sold, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
    )
    .bind(id)
    .bind(edition_id)
    .bind("Standard")
    .bind(price)
    .bind(quantity)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Inserts a pending order over the given `(ticket_type, quantity)` pairs,
/// totalled from the current catalog prices.
pub(crate) async fn seed_order(pool: &SqlitePool, edition_id: Uuid, items: &[(Uuid, i64)]) -> Uuid {
    let mut total = 0;
    let mut priced = Vec::with_capacity(items.len());
    for &(ticket_type_id, quantity) in items {
        let ticket_type = store::fetch_ticket_type(pool, ticket_type_id)
            .await
            .unwrap()
            .unwrap();
        total += ticket_type.price * quantity;
        priced.push((ticket_type_id, quantity, ticket_type.price));
    }

    let order = Order {
        id: Uuid::new_v4(),
        edition_id,
        buyer_name: "Ada Lovelace".to_string(),
        buyer_email: "ada@example.org".to_string(),
        status: OrderStatus::Pending,
        total_amount: total,
        currency: "EUR".to_string(),
        invoice_number: None,
        credit_note_number: None,
        payment_ref: None,
        paid_at: None,
        created_at: Utc::now(),
    };
    store::insert_order(pool, &order).await.unwrap();
    for (ticket_type_id, quantity, unit_price) in priced {
        store::insert_order_item(pool, order.id, ticket_type_id, quantity, unit_price)
            .await
            .unwrap();
    }
    order.id
}

/// Current `quantity_sold` for a ticket type.
pub(crate) async fn quantity_sold(pool: &SqlitePool, ticket_type_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT quantity_sold FROM ticket_types WHERE id = ?1")
        .bind(ticket_type_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Builds a `Stripe-Signature` style header over `payload`, signed with
/// `secret` at `timestamp`.
pub(crate) fn stripe_signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

/// Notification sink that records which orders were announced, for asserting
/// that confirmations fire exactly once.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    completed: Mutex<Vec<Uuid>>,
}

impl RecordingNotifier {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn completed_orders(&self) -> Vec<Uuid> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn order_completed(&self, order: &Order) -> Result<(), NotifyError> {
        self.completed.lock().unwrap().push(order.id);
        Ok(())
    }
}

/// Application state wired with the mock provider and the log notifier.
pub(crate) fn test_state(pool: &SqlitePool) -> AppState {
    AppState {
        pool: pool.clone(),
        provider: MockPaymentProvider::shared(),
        notifier: LogNotifier::shared(),
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
        checkout_urls: CheckoutUrls {
            success: "http://localhost:3000/thanks".to_string(),
            cancel: "http://localhost:3000/cart".to_string(),
        },
    }
}
