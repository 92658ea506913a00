//! Raw sqlx access to the single `ledger_events` table (spec.md §4.4,
//! §9's single-table-with-jsonb-detail option). Hash chaining lives one
//! layer up, in the `ledger` crate; this module only knows how to insert
//! and read rows.

use {
    chrono::{DateTime, Utc},
    model::{
        ids::{LedgerEventId, LedgerSequence, PropertyId, UserId},
        ledger::EventKind,
    },
    sqlx::{types::Json, PgConnection},
};

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct LedgerRow {
    pub event_id: LedgerEventId,
    pub event_kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub actor_user_id: UserId,
    pub item_id: PropertyId,
    pub detail: sqlx::types::Json<serde_json::Value>,
    pub sequence_number: LedgerSequence,
    pub prev_hash: Vec<u8>,
    pub entry_hash: Vec<u8>,
}

/// The most recently appended row, used to derive the next `prev_hash`.
/// `FOR UPDATE` serializes concurrent appenders so two callers can never
/// compute the same `sequence_number`/`prev_hash` pair.
pub async fn last_for_update(ex: &mut PgConnection) -> sqlx::Result<Option<LedgerRow>> {
    sqlx::query_as::<_, LedgerRow>(
        "SELECT * FROM ledger_events ORDER BY sequence_number DESC LIMIT 1 FOR UPDATE",
    )
    .fetch_optional(ex)
    .await
}

/// `timestamp` is supplied by the caller (rather than a DB-side default) so
/// that the `ledger` crate can compute `entry_hash` over the exact row
/// being persisted before issuing the insert.
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    ex: &mut PgConnection,
    event_kind: EventKind,
    timestamp: DateTime<Utc>,
    actor_user_id: UserId,
    item_id: PropertyId,
    detail: serde_json::Value,
    sequence_number: LedgerSequence,
    prev_hash: &[u8],
    entry_hash: &[u8],
) -> sqlx::Result<LedgerRow> {
    sqlx::query_as::<_, LedgerRow>(
        "INSERT INTO ledger_events
            (event_kind, \"timestamp\", actor_user_id, item_id, detail, sequence_number, prev_hash, entry_hash)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(event_kind)
    .bind(timestamp)
    .bind(actor_user_id)
    .bind(item_id)
    .bind(Json(detail))
    .bind(sequence_number)
    .bind(prev_hash)
    .bind(entry_hash)
    .fetch_one(ex)
    .await
}

pub async fn history_for_item(
    ex: &mut PgConnection,
    item_id: PropertyId,
) -> sqlx::Result<Vec<LedgerRow>> {
    sqlx::query_as::<_, LedgerRow>(
        "SELECT * FROM ledger_events WHERE item_id = $1 ORDER BY \"timestamp\" ASC, sequence_number ASC",
    )
    .bind(item_id)
    .fetch_all(ex)
    .await
}

pub async fn general_history(
    ex: &mut PgConnection,
    kind: Option<EventKind>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<LedgerRow>> {
    sqlx::query_as::<_, LedgerRow>(
        "SELECT * FROM ledger_events
         WHERE $1::TEXT IS NULL OR event_kind = $1
         ORDER BY \"timestamp\" ASC, sequence_number ASC
         LIMIT $2 OFFSET $3",
    )
    .bind(kind)
    .bind(limit.clamp(1, 1000))
    .bind(offset.max(0))
    .fetch_all(ex)
    .await
}

/// `CORRECTION` rows naming `original_event_id` in their detail blob.
pub async fn corrections_for(
    ex: &mut PgConnection,
    original_event_id: LedgerEventId,
) -> sqlx::Result<Vec<LedgerRow>> {
    sqlx::query_as::<_, LedgerRow>(
        "SELECT * FROM ledger_events
         WHERE event_kind = 'CORRECTION' AND (detail->>'original_event_id')::BIGINT = $1
         ORDER BY sequence_number ASC",
    )
    .bind(original_event_id.get())
    .fetch_all(ex)
    .await
}

/// Every row, in chain order, for `verify_integrity` (spec.md §4.4).
pub async fn all_in_order(ex: &mut PgConnection) -> sqlx::Result<Vec<LedgerRow>> {
    sqlx::query_as::<_, LedgerRow>("SELECT * FROM ledger_events ORDER BY sequence_number ASC")
        .fetch_all(ex)
        .await
}
