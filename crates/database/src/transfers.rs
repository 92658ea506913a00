use {
    chrono::{DateTime, Utc},
    model::{
        ids::{PropertyId, TransferId, UserId},
        transfer::{TransferStatus, TransferType},
    },
    sqlx::PgConnection,
};

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Transfer {
    pub id: TransferId,
    pub property_id: PropertyId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub initiator_id: UserId,
    pub transfer_type: TransferType,
    pub status: TransferStatus,
    pub include_components: bool,
    pub requested_serial_number: Option<String>,
    pub notes: Option<String>,
    pub request_date: DateTime<Utc>,
    pub resolved_date: Option<DateTime<Utc>>,
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    ex: &mut PgConnection,
    property_id: PropertyId,
    from_user_id: UserId,
    to_user_id: UserId,
    initiator_id: UserId,
    transfer_type: TransferType,
    include_components: bool,
    requested_serial_number: Option<&str>,
    notes: Option<&str>,
) -> sqlx::Result<Transfer> {
    sqlx::query_as::<_, Transfer>(
        "INSERT INTO transfers (
            property_id, from_user_id, to_user_id, initiator_id, transfer_type,
            include_components, requested_serial_number, notes
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(property_id)
    .bind(from_user_id)
    .bind(to_user_id)
    .bind(initiator_id)
    .bind(transfer_type)
    .bind(include_components)
    .bind(requested_serial_number)
    .bind(notes)
    .fetch_one(ex)
    .await
}

pub async fn get_for_update(
    ex: &mut PgConnection,
    id: TransferId,
) -> sqlx::Result<Option<Transfer>> {
    sqlx::query_as::<_, Transfer>("SELECT * FROM transfers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn get(ex: &mut PgConnection, id: TransferId) -> sqlx::Result<Option<Transfer>> {
    sqlx::query_as::<_, Transfer>("SELECT * FROM transfers WHERE id = $1")
        .bind(id)
        .fetch_optional(ex)
        .await
}

/// Moves a `pending` transfer to a terminal state. Only matches if still
/// `pending`, so a racing caller observing a stale read gets `Ok(None)`
/// instead of clobbering a state another transaction already resolved.
pub async fn resolve(
    ex: &mut PgConnection,
    id: TransferId,
    status: TransferStatus,
) -> sqlx::Result<Option<Transfer>> {
    sqlx::query_as::<_, Transfer>(
        "UPDATE transfers SET status = $2, resolved_date = now()
         WHERE id = $1 AND status = 'pending'
         RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(ex)
    .await
}

/// Sweeps every transfer still `pending` past `horizon` to `cancelled`
/// (spec.md §5). Uses `FOR UPDATE SKIP LOCKED` so the sweeper never blocks
/// on, or double-processes, a transfer a human request is concurrently
/// resolving.
pub async fn sweep_expired(
    ex: &mut PgConnection,
    horizon: DateTime<Utc>,
) -> sqlx::Result<Vec<Transfer>> {
    sqlx::query_as::<_, Transfer>(
        "UPDATE transfers SET status = 'cancelled', resolved_date = now()
         WHERE id IN (
             SELECT id FROM transfers
             WHERE status = 'pending' AND request_date < $1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .bind(horizon)
    .fetch_all(ex)
    .await
}
