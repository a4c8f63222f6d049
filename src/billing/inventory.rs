use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use super::error::BillingError;

/// Reserves `quantity` units of a ticket type, or fails with `SoldOut` while
/// changing nothing. The capacity check and the increment are one guarded
/// UPDATE, so two orders competing for the last units can never both win.
/// A NULL capacity means the type is unlimited.
pub(crate) async fn reserve(
    tx: &mut Transaction<'_, Sqlite>,
    ticket_type_id: Uuid,
    quantity: i64,
) -> Result<(), BillingError> {
    let result = sqlx::query(
        "UPDATE ticket_types SET quantity_sold = quantity_sold + ?1 \
         WHERE id = ?2 AND (quantity IS NULL OR quantity_sold + ?1 <= quantity)",
    )
    .bind(quantity)
    .bind(ticket_type_id)
    .execute(tx.as_mut())
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    // The guard rejected the update; find out whether the row exists at all.
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM ticket_types WHERE id = ?1")
        .bind(ticket_type_id)
        .fetch_optional(tx.as_mut())
        .await?;

    match exists {
        Some(_) => Err(BillingError::SoldOut(ticket_type_id)),
        None => Err(BillingError::TicketTypeNotFound(ticket_type_id)),
    }
}

/// Returns previously reserved units, flooring at zero so a stray release can
/// never drive the sold count negative.
pub(crate) async fn release(
    tx: &mut Transaction<'_, Sqlite>,
    ticket_type_id: Uuid,
    quantity: i64,
) -> Result<(), BillingError> {
    sqlx::query("UPDATE ticket_types SET quantity_sold = MAX(quantity_sold - ?1, 0) WHERE id = ?2")
        .bind(quantity)
        .bind(ticket_type_id)
        .execute(tx.as_mut())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{quantity_sold, seed_catalog, seed_ticket_type, setup_test_db};

    #[tokio::test]
    async fn reserve_increments_the_sold_count() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let ticket_type = seed_ticket_type(&pool, catalog.edition_id, 2500, Some(10)).await;

        let mut tx = pool.begin().await.unwrap();
        reserve(&mut tx, ticket_type, 3).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(quantity_sold(&pool, ticket_type).await, 3);
    }

    #[tokio::test]
    async fn reserve_may_take_the_last_unit_but_not_more() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let ticket_type = seed_ticket_type(&pool, catalog.edition_id, 2500, Some(2)).await;

        let mut tx = pool.begin().await.unwrap();
        reserve(&mut tx, ticket_type, 2).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let err = reserve(&mut tx, ticket_type, 1).await.unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, BillingError::SoldOut(id) if id == ticket_type));
        assert_eq!(quantity_sold(&pool, ticket_type).await, 2);
    }

    #[tokio::test]
    async fn oversized_reservation_changes_nothing() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let ticket_type = seed_ticket_type(&pool, catalog.edition_id, 2500, Some(5)).await;

        let mut tx = pool.begin().await.unwrap();
        let err = reserve(&mut tx, ticket_type, 6).await.unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, BillingError::SoldOut(_)));
        assert_eq!(quantity_sold(&pool, ticket_type).await, 0);
    }

    #[tokio::test]
    async fn unlimited_types_never_sell_out() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let ticket_type = seed_ticket_type(&pool, catalog.edition_id, 0, None).await;

        let mut tx = pool.begin().await.unwrap();
        reserve(&mut tx, ticket_type, 10_000).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(quantity_sold(&pool, ticket_type).await, 10_000);
    }

    #[tokio::test]
    async fn unknown_ticket_type_is_reported_as_missing() {
        let pool = setup_test_db().await;
        let missing = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        let err = reserve(&mut tx, missing, 1).await.unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, BillingError::TicketTypeNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn release_returns_units_and_floors_at_zero() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let ticket_type = seed_ticket_type(&pool, catalog.edition_id, 2500, Some(10)).await;

        let mut tx = pool.begin().await.unwrap();
        reserve(&mut tx, ticket_type, 4).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        release(&mut tx, ticket_type, 3).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(quantity_sold(&pool, ticket_type).await, 1);

        let mut tx = pool.begin().await.unwrap();
        release(&mut tx, ticket_type, 5).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(quantity_sold(&pool, ticket_type).await, 0);
    }

    #[tokio::test]
    async fn concurrent_reservations_cannot_oversell() {
        let pool = setup_test_db().await;
        let catalog = seed_catalog(&pool).await;
        let ticket_type = seed_ticket_type(&pool, catalog.edition_id, 2500, Some(1)).await;

        let reserve_one = |pool: sqlx::SqlitePool| async move {
            let mut tx = pool.begin().await.unwrap();
            let outcome = reserve(&mut tx, ticket_type, 1).await;
            match outcome {
                Ok(()) => {
                    tx.commit().await.unwrap();
                    true
                }
                Err(BillingError::SoldOut(_)) => {
                    tx.rollback().await.unwrap();
                    false
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        };

        let (first, second) = tokio::join!(reserve_one(pool.clone()), reserve_one(pool.clone()));

        assert!(first ^ second, "exactly one reservation may win");
        assert_eq!(quantity_sold(&pool, ticket_type).await, 1);
    }
}
