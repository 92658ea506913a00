//! Connection Graph (spec.md §4.5): directed trust edges gating who may
//! request or offer property to whom. An `accepted` edge in either
//! direction authorizes request/offer traffic between the two users;
//! `blocked` is one-directional and suppresses new transfers and
//! notifications to the blocker from the blocked party.

pub use database::connections::UserConnection as Connection;
use {
    model::{
        ids::{ConnectionId, UserId},
        connection::ConnectionStatus,
        Error, Result,
    },
    sqlx::PgPool,
};

/// Creates (or re-requests) a pending edge from `user_id` to
/// `target_user_id`. Re-requesting an existing edge leaves its current
/// status untouched — only a fresh pair starts out `pending`.
pub async fn request_connection(
    pool: &PgPool,
    user_id: UserId,
    target_user_id: UserId,
) -> Result<Connection> {
    if user_id == target_user_id {
        return Err(Error::validation("cannot connect to yourself"));
    }
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::connections::request(&mut conn, user_id, target_user_id)
        .await
        .map_err(|e| model::error::from_sqlx(e, |_| None))
}

/// Only the recipient (`connected_user_id`) may respond to a connection
/// request (spec.md §7's `NotPermitted`: "actor is not the counter-party").
pub async fn respond(
    pool: &PgPool,
    responder: UserId,
    connection_id: ConnectionId,
    decision: ConnectionStatus,
) -> Result<Connection> {
    let mut tx = pool.begin().await.map_err(|e| Error::Internal(e.into()))?;
    let existing = database::connections::get(&mut tx, connection_id)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("connection {connection_id}")))?;
    if existing.connected_user_id != responder {
        return Err(Error::not_permitted(
            "only the recipient may respond to a connection request",
        ));
    }

    let updated = database::connections::respond(&mut tx, connection_id, decision)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("connection {connection_id}")))?;
    tx.commit().await.map_err(|e| Error::Internal(e.into()))?;
    Ok(updated)
}

pub async fn list(pool: &PgPool, user_id: UserId) -> Result<Vec<Connection>> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::connections::list(&mut conn, user_id)
        .await
        .map_err(|e| Error::Internal(e.into()))
}

/// Whether `a` and `b` currently authorize request/offer traffic between
/// themselves (accepted, and neither has blocked the other).
pub async fn is_connected(pool: &PgPool, a: UserId, b: UserId) -> Result<bool> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::connections::is_connected(&mut conn, a, b)
        .await
        .map_err(|e| Error::Internal(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore]
    async fn postgres_request_and_respond() {
        let pool = PgPool::connect("postgresql://").await.unwrap();
        database::clear_DANGER(&pool).await.unwrap();

        let a = UserId::new(1);
        let b = UserId::new(2);
        let edge = request_connection(&pool, a, b).await.unwrap();
        assert_eq!(edge.status, ConnectionStatus::Pending);

        let err = respond(&pool, a, edge.id, ConnectionStatus::Accepted)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), model::error::Kind::NotPermitted);

        let accepted = respond(&pool, b, edge.id, ConnectionStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.status, ConnectionStatus::Accepted);
        assert!(is_connected(&pool, a, b).await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_rejects_self_connection() {
        let pool = PgPool::connect("postgresql://").await.unwrap();
        let err = request_connection(&pool, UserId::new(1), UserId::new(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), model::error::Kind::ValidationError);
    }
}
