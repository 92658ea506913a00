use {
    chrono::{DateTime, Utc},
    model::{connection::ConnectionStatus, ids::UserId},
    sqlx::PgConnection,
};

#[derive(Clone, Copy, Debug, sqlx::FromRow)]
pub struct UserConnection {
    pub id: model::ids::ConnectionId,
    pub user_id: UserId,
    pub connected_user_id: UserId,
    pub status: ConnectionStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

pub async fn request(
    ex: &mut PgConnection,
    user_id: UserId,
    connected_user_id: UserId,
) -> sqlx::Result<UserConnection> {
    sqlx::query_as::<_, UserConnection>(
        "INSERT INTO user_connections (user_id, connected_user_id)
         VALUES ($1, $2)
         ON CONFLICT (user_id, connected_user_id) DO UPDATE SET user_id = EXCLUDED.user_id
         RETURNING *",
    )
    .bind(user_id)
    .bind(connected_user_id)
    .fetch_one(ex)
    .await
}

pub async fn respond(
    ex: &mut PgConnection,
    id: model::ids::ConnectionId,
    status: ConnectionStatus,
) -> sqlx::Result<Option<UserConnection>> {
    sqlx::query_as::<_, UserConnection>(
        "UPDATE user_connections SET status = $2, responded_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(ex)
    .await
}

pub async fn get(
    ex: &mut PgConnection,
    id: model::ids::ConnectionId,
) -> sqlx::Result<Option<UserConnection>> {
    sqlx::query_as::<_, UserConnection>("SELECT * FROM user_connections WHERE id = $1")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn list(ex: &mut PgConnection, user_id: UserId) -> sqlx::Result<Vec<UserConnection>> {
    sqlx::query_as::<_, UserConnection>(
        "SELECT * FROM user_connections WHERE user_id = $1 OR connected_user_id = $1",
    )
    .bind(user_id)
    .fetch_all(ex)
    .await
}

/// True if `a` and `b` have an `accepted` edge in either direction and
/// neither has `blocked` the other (spec.md §4.5).
pub async fn is_connected(ex: &mut PgConnection, a: UserId, b: UserId) -> sqlx::Result<bool> {
    let blocked: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM user_connections
         WHERE status = 'blocked'
           AND ((user_id = $2 AND connected_user_id = $1) OR (user_id = $1 AND connected_user_id = $2))",
    )
    .bind(a)
    .bind(b)
    .fetch_optional(&mut *ex)
    .await?;
    if blocked.is_some() {
        return Ok(false);
    }

    let accepted: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM user_connections
         WHERE status = 'accepted'
           AND ((user_id = $1 AND connected_user_id = $2) OR (user_id = $2 AND connected_user_id = $1))",
    )
    .bind(a)
    .bind(b)
    .fetch_optional(ex)
    .await?;
    Ok(accepted.is_some())
}
