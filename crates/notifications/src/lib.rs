//! Notification Dispatcher (spec.md §4.6): durable + ephemeral. Every
//! relevant engine event produces a `Notification` row for the target user
//! in the engine's own transaction (`create`); in parallel, the dispatcher
//! makes a best-effort push attempt that never fails the owning
//! transaction (spec.md §7: "push failure is swallowed; the durable
//! Notification row is the user contract").

pub use database::notifications::Notification;
use {
    model::{
        ids::{NotificationId, UserId},
        notification::{NotificationKind, Priority},
        Error, Result,
    },
    sqlx::{PgConnection, PgPool},
    std::sync::Arc,
};

#[derive(Debug, thiserror::Error)]
#[error("push delivery failed: {0}")]
pub struct PushError(pub String);

/// Best-effort outbound push collaborator (spec.md §9's "explicit
/// dependencies, not ambient globals" design note).
#[async_trait::async_trait]
pub trait PushSink: Send + Sync {
    async fn push(&self, user_id: UserId, notification: &Notification) -> Result<(), PushError>;
}

/// Default wiring: the real push vendor is out of scope (spec.md §4.6), so
/// this sink simply reports success without delivering anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPushSink;

#[async_trait::async_trait]
impl PushSink for NullPushSink {
    async fn push(&self, _user_id: UserId, _notification: &Notification) -> Result<(), PushError> {
        Ok(())
    }
}

/// Inserts the durable Notification row. Callers append this inside the
/// same transaction as the event it reports, so a rollback of the
/// triggering mutation also rolls back the notification.
#[allow(clippy::too_many_arguments)]
pub async fn create(
    ex: &mut PgConnection,
    user_id: UserId,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: serde_json::Value,
    priority: Priority,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<Notification> {
    database::notifications::insert(ex, user_id, kind, title, message, data, priority, expires_at)
        .await
        .map_err(|e| Error::Internal(e.into()))
}

pub async fn list(
    pool: &PgPool,
    user_id: UserId,
    limit: i64,
    offset: i64,
    unread_only: bool,
) -> Result<Vec<Notification>> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::notifications::list(&mut conn, user_id, limit, offset, unread_only)
        .await
        .map_err(|e| Error::Internal(e.into()))
}

pub async fn unread_count(pool: &PgPool, user_id: UserId) -> Result<i64> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::notifications::unread_count(&mut conn, user_id)
        .await
        .map_err(|e| Error::Internal(e.into()))
}

pub async fn mark_read(pool: &PgPool, user_id: UserId, id: NotificationId) -> Result<()> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    let rows = database::notifications::mark_read(&mut conn, user_id, id)
        .await
        .map_err(|e| Error::Internal(e.into()))?;
    if rows == 0 {
        return Err(Error::not_found(format!("notification {id}")));
    }
    Ok(())
}

pub async fn mark_all_read(pool: &PgPool, user_id: UserId) -> Result<u64> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::notifications::mark_all_read(&mut conn, user_id)
        .await
        .map_err(|e| Error::Internal(e.into()))
}

pub async fn expire_older_than(pool: &PgPool, user_id: UserId, days: i64) -> Result<u64> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::notifications::expire_older_than(&mut conn, user_id, days)
        .await
        .map_err(|e| Error::Internal(e.into()))
}

/// Holds the push collaborator and fires it outside the caller's
/// transaction, logging rather than propagating failure.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn PushSink>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn PushSink>) -> Self {
        Self { sink }
    }

    pub async fn dispatch(&self, user_id: UserId, notification: &Notification) {
        if let Err(err) = self.sink.push(user_id, notification).await {
            tracing::warn!(%user_id, notification_id = %notification.id, %err, "push delivery failed");
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(NullPushSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait::async_trait]
    impl PushSink for FailingSink {
        async fn push(&self, _user_id: UserId, _notification: &Notification) -> Result<(), PushError> {
            Err(PushError("vendor unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn dispatch_never_panics_on_push_failure() {
        let dispatcher = Dispatcher::new(Arc::new(FailingSink));
        let notification = Notification {
            id: NotificationId::new(1),
            user_id: UserId::new(1),
            kind: NotificationKind::TransferRequested,
            title: "Transfer requested".to_string(),
            message: "you have a pending transfer".to_string(),
            data: sqlx::types::Json(serde_json::json!({})),
            read: false,
            priority: Priority::Normal,
            created_at: chrono::Utc::now(),
            expires_at: None,
        };
        dispatcher.dispatch(UserId::new(1), &notification).await;
    }
}
