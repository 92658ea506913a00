//! Notification Dispatcher routes (spec.md §4.6/§6).

use {
    crate::{ApiResult, AppState, auth::AuthenticatedUser},
    axum::extract::{Path, Query, State},
    model::ids::NotificationId,
    notifications::Notification,
    serde::Deserialize,
};

#[derive(Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub unread_only: bool,
}

fn default_limit() -> i64 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Vec<Notification>> {
    let notifications = notifications::list(
        &state.pool,
        actor,
        query.limit,
        query.offset,
        query.unread_only,
    )
    .await?;
    Ok(axum::Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<NotificationId>,
) -> Result<axum::http::StatusCode, crate::ApiError> {
    notifications::mark_read(&state.pool, actor, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<axum::http::StatusCode, crate::ApiError> {
    notifications::mark_all_read(&state.pool, actor).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
