//! The append-only event ledger (spec.md §4.4): a hash-chained, strictly
//! time- and sequence-ordered log that parallels the mutable registry
//! state. `append` must be called with an `&mut sqlx::PgConnection`
//! borrowed from the *same* transaction as the registry mutation it
//! describes (spec.md §5) — it never opens its own transaction.

use {
    database::ledger::LedgerRow,
    model::{
        ids::{LedgerEventId, LedgerSequence, PropertyId, UserId},
        ledger::{EventDetail, EventKind, IntegrityReport, LedgerEvent},
    },
    sha2::{Digest, Sha256},
    sqlx::PgConnection,
};

/// `prev_hash` of the very first record in the chain.
const GENESIS_HASH: [u8; 32] = [0u8; 32];

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: std::collections::BTreeMap<String, serde_json::Value> =
                std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k.clone(), canonicalize(v));
            }
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Deterministic SHA-256 over the canonical (field-sorted) encoding of one
/// ledger row, including the `prev_hash` it was inserted with (SPEC_FULL.md
/// §4.4). This is the row's own `entry_hash`: persisted at insert time and
/// recomputed by `verify_integrity` to detect tampering of that exact row,
/// independent of whether any later row exists to cross-check it against.
fn hash_row(row: &LedgerRow) -> [u8; 32] {
    let canonical = serde_json::json!({
        "sequence_number": row.sequence_number.get(),
        "event_kind": row.event_kind.as_str(),
        "timestamp": row.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        "actor_user_id": row.actor_user_id.get(),
        "item_id": row.item_id.get(),
        "detail": canonicalize(&row.detail.0),
        "prev_hash": row.prev_hash,
    });
    let bytes = serde_json::to_vec(&canonical).expect("canonical ledger encoding never fails");
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn row_to_event(row: LedgerRow) -> LedgerEvent {
    LedgerEvent {
        event_id: row.event_id,
        event_kind: row.event_kind,
        timestamp: row.timestamp,
        actor_user_id: row.actor_user_id,
        item_id: row.item_id,
        detail: row.detail.0,
        sequence_number: row.sequence_number,
        prev_hash: row.prev_hash,
    }
}

/// Appends one event to the chain within the caller's transaction. Assigns
/// `sequence_number = last + 1`, `prev_hash = entry_hash` of the last row,
/// and computes this row's own `entry_hash` before it is persisted (spec.md
/// §4.4).
pub async fn append(
    ex: &mut PgConnection,
    actor_user_id: UserId,
    item_id: PropertyId,
    detail: EventDetail,
) -> sqlx::Result<LedgerEvent> {
    let last = database::ledger::last_for_update(ex).await?;
    let (next_seq, prev_hash) = match &last {
        Some(row) => (row.sequence_number.get() + 1, row.entry_hash.clone()),
        None => (1, GENESIS_HASH.to_vec()),
    };

    let detail_json =
        serde_json::to_value(&detail).expect("EventDetail always serializes to JSON");
    let timestamp = chrono::Utc::now();
    let sequence_number = LedgerSequence::new(next_seq);
    let entry_hash = hash_row(&LedgerRow {
        event_id: LedgerEventId::new(0),
        event_kind: detail.kind(),
        timestamp,
        actor_user_id,
        item_id,
        detail: sqlx::types::Json(detail_json.clone()),
        sequence_number,
        prev_hash: prev_hash.clone(),
        entry_hash: Vec::new(),
    });

    let row = database::ledger::insert(
        ex,
        detail.kind(),
        timestamp,
        actor_user_id,
        item_id,
        detail_json,
        sequence_number,
        &prev_hash,
        &entry_hash,
    )
    .await?;
    Ok(row_to_event(row))
}

pub async fn history_for_item(
    ex: &mut PgConnection,
    item_id: PropertyId,
) -> sqlx::Result<Vec<LedgerEvent>> {
    Ok(database::ledger::history_for_item(ex, item_id)
        .await?
        .into_iter()
        .map(row_to_event)
        .collect())
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HistoryFilter {
    pub kind: Option<EventKind>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn general_history(
    ex: &mut PgConnection,
    filter: HistoryFilter,
) -> sqlx::Result<Vec<LedgerEvent>> {
    Ok(
        database::ledger::general_history(ex, filter.kind, filter.limit, filter.offset)
            .await?
            .into_iter()
            .map(row_to_event)
            .collect(),
    )
}

pub async fn corrections_for(
    ex: &mut PgConnection,
    original_event_id: LedgerEventId,
) -> sqlx::Result<Vec<LedgerEvent>> {
    Ok(database::ledger::corrections_for(ex, original_event_id)
        .await?
        .into_iter()
        .map(row_to_event)
        .collect())
}

/// Recomputes the hash chain end-to-end and reports the first row that
/// diverges, either because its `prev_hash` doesn't match the row before it
/// (reorder/deletion) or because its stored `entry_hash` no longer matches
/// a fresh `hash_row` of its own content (tampering of that exact row,
/// including the last row in the chain). Reports the diverging row's own
/// `sequence_number` in both cases (spec.md §4.4, testable property 6).
pub async fn verify_integrity(ex: &mut PgConnection) -> sqlx::Result<IntegrityReport> {
    let rows = database::ledger::all_in_order(ex).await?;
    let mut expected_prev = GENESIS_HASH.to_vec();
    for row in &rows {
        if row.prev_hash != expected_prev || hash_row(row).to_vec() != row.entry_hash {
            return Ok(IntegrityReport {
                ok: false,
                first_divergence_seq: Some(row.sequence_number),
            });
        }
        expected_prev = row.entry_hash.clone();
    }
    Ok(IntegrityReport {
        ok: true,
        first_divergence_seq: None,
    })
}

/// Appends a `CORRECTION` record naming the event it supersedes (spec.md
/// §4.4). The original record is never mutated (I9); readers must apply
/// corrections themselves when reconstructing state.
pub async fn correct(
    ex: &mut PgConnection,
    actor_user_id: UserId,
    item_id: PropertyId,
    original_event_id: LedgerEventId,
    original_event_kind: EventKind,
    reason: String,
) -> sqlx::Result<LedgerEvent> {
    append(
        ex,
        actor_user_id,
        item_id,
        EventDetail::Correction {
            original_event_id,
            original_event_kind,
            reason,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_is_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(
            serde_json::to_vec(&canonicalize(&a)).unwrap(),
            serde_json::to_vec(&canonicalize(&b)).unwrap()
        );
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_append_and_verify() {
        let pool = sqlx::PgPool::connect("postgresql://").await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        database::clear_DANGER_(&mut tx).await.unwrap();

        let a = append(
            &mut tx,
            UserId::new(1),
            PropertyId::new(10),
            EventDetail::Created,
        )
        .await
        .unwrap();
        assert_eq!(a.sequence_number.get(), 1);
        assert_eq!(a.prev_hash, GENESIS_HASH.to_vec());

        let b = append(
            &mut tx,
            UserId::new(1),
            PropertyId::new(10),
            EventDetail::Verified,
        )
        .await
        .unwrap();
        assert_eq!(b.sequence_number.get(), 2);
        assert_ne!(b.prev_hash, GENESIS_HASH.to_vec());

        let report = verify_integrity(&mut tx).await.unwrap();
        assert!(report.ok);

        let history = history_for_item(&mut tx, PropertyId::new(10)).await.unwrap();
        assert_eq!(history.len(), 2);

        sqlx::query("UPDATE ledger_events SET detail = '{\"tampered\": true}' WHERE sequence_number = $1")
            .bind(b.sequence_number)
            .execute(&mut *tx)
            .await
            .unwrap();
        let report = verify_integrity(&mut tx).await.unwrap();
        assert!(!report.ok);
        assert_eq!(report.first_divergence_seq, Some(b.sequence_number));
    }
}
