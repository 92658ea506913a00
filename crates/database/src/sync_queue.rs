//! Offline-sync queue (spec.md §6): clients POST queue entries keyed by
//! `(client_id, entity_kind, op)`; the server resolves idempotently and
//! reports `{applied, conflict, rejected}` per entry.

use sqlx::{types::Json, PgConnection};

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncOp {
    Create,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncQueueStatus {
    Pending,
    Applied,
    Conflict,
    Rejected,
}

#[derive(Clone, Debug, serde::Serialize, sqlx::FromRow)]
pub struct SyncQueueEntry {
    pub id: model::ids::SyncQueueId,
    pub client_id: String,
    pub op: SyncOp,
    pub entity_kind: String,
    pub entity_id: Option<i64>,
    pub payload: sqlx::types::Json<serde_json::Value>,
    pub status: SyncQueueStatus,
    pub retry_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Idempotent insert keyed by `(client_id, entity_kind, op)`: a retried
/// enqueue of the same logical operation returns the existing row instead
/// of creating a duplicate.
pub async fn enqueue(
    ex: &mut PgConnection,
    client_id: &str,
    op: SyncOp,
    entity_kind: &str,
    entity_id: Option<i64>,
    payload: serde_json::Value,
) -> sqlx::Result<SyncQueueEntry> {
    sqlx::query_as::<_, SyncQueueEntry>(
        "INSERT INTO offline_sync_queue (client_id, op, entity_kind, entity_id, payload)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (client_id, entity_kind, op) DO UPDATE SET payload = EXCLUDED.payload
         RETURNING *",
    )
    .bind(client_id)
    .bind(op)
    .bind(entity_kind)
    .bind(entity_id)
    .bind(Json(payload))
    .fetch_one(ex)
    .await
}

pub async fn mark(
    ex: &mut PgConnection,
    id: model::ids::SyncQueueId,
    status: SyncQueueStatus,
) -> sqlx::Result<u64> {
    Ok(
        sqlx::query("UPDATE offline_sync_queue SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(ex)
            .await?
            .rows_affected(),
    )
}

pub async fn pending_for_client(
    ex: &mut PgConnection,
    client_id: &str,
) -> sqlx::Result<Vec<SyncQueueEntry>> {
    sqlx::query_as::<_, SyncQueueEntry>(
        "SELECT * FROM offline_sync_queue WHERE client_id = $1 AND status = 'pending'",
    )
    .bind(client_id)
    .fetch_all(ex)
    .await
}
