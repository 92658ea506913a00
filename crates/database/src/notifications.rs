use {
    chrono::{DateTime, Utc},
    model::{
        ids::{NotificationId, UserId},
        notification::{NotificationKind, Priority},
    },
    sqlx::{types::Json, PgConnection},
};

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: sqlx::types::Json<serde_json::Value>,
    pub read: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    ex: &mut PgConnection,
    user_id: UserId,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: serde_json::Value,
    priority: Priority,
    expires_at: Option<DateTime<Utc>>,
) -> sqlx::Result<Notification> {
    sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (user_id, kind, title, message, data, priority, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(user_id)
    .bind(kind)
    .bind(title)
    .bind(message)
    .bind(Json(data))
    .bind(priority)
    .bind(expires_at)
    .fetch_one(ex)
    .await
}

pub async fn list(
    ex: &mut PgConnection,
    user_id: UserId,
    limit: i64,
    offset: i64,
    unread_only: bool,
) -> sqlx::Result<Vec<Notification>> {
    sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications
         WHERE user_id = $1 AND ($4 = FALSE OR read = FALSE)
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit.clamp(1, 500))
    .bind(offset.max(0))
    .bind(unread_only)
    .fetch_all(ex)
    .await
}

pub async fn unread_count(ex: &mut PgConnection, user_id: UserId) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE")
        .bind(user_id)
        .fetch_one(ex)
        .await
}

pub async fn mark_read(
    ex: &mut PgConnection,
    user_id: UserId,
    id: NotificationId,
) -> sqlx::Result<u64> {
    Ok(
        sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(ex)
            .await?
            .rows_affected(),
    )
}

pub async fn mark_all_read(ex: &mut PgConnection, user_id: UserId) -> sqlx::Result<u64> {
    Ok(
        sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
            .bind(user_id)
            .execute(ex)
            .await?
            .rows_affected(),
    )
}

pub async fn expire_older_than(
    ex: &mut PgConnection,
    user_id: UserId,
    days: i64,
) -> sqlx::Result<u64> {
    Ok(sqlx::query(
        "DELETE FROM notifications
         WHERE user_id = $1 AND created_at < now() - make_interval(days => $2::int)",
    )
    .bind(user_id)
    .bind(days)
    .execute(ex)
    .await?
    .rows_affected())
}
