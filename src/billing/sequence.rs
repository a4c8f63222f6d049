use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use super::error::BillingError;

/// Document series that draw from the per-organization counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    CreditNote,
}

impl DocumentKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::CreditNote => "credit_note",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::CreditNote => "CN",
        }
    }
}

/// Atomically increments the counter for `(organization, kind)` and returns
/// the formatted document number. The increment-and-read happens in a single
/// statement, so two concurrent callers can never observe the same value.
///
/// Must run inside the transaction that also records the document: if that
/// transaction rolls back, the increment rolls back with it and the series
/// stays gap-free.
pub(crate) async fn next_document_number(
    tx: &mut Transaction<'_, Sqlite>,
    organization_id: Uuid,
    kind: DocumentKind,
) -> Result<String, BillingError> {
    let value: i64 = sqlx::query_scalar(
        "INSERT INTO document_sequences (organization_id, kind, next_value) VALUES (?1, ?2, 1) \
         ON CONFLICT (organization_id, kind) DO UPDATE SET next_value = next_value + 1 \
         RETURNING next_value",
    )
    .bind(organization_id)
    .bind(kind.as_str())
    .fetch_one(tx.as_mut())
    .await
    .map_err(|source| BillingError::Sequence {
        organization_id,
        source,
    })?;

    Ok(format!("{}-{:06}", kind.prefix(), value))
}
