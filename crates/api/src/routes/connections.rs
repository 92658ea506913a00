//! Connection Graph routes (spec.md §4.5/§6).

use {
    crate::{ApiResult, AppState, auth::AuthenticatedUser},
    axum::extract::{Path, State},
    connections::Connection,
    model::{connection::ConnectionStatus, ids::{ConnectionId, UserId}},
    serde::Deserialize,
};

#[derive(Deserialize)]
pub struct RequestConnectionRequest {
    pub target_user_id: UserId,
}

pub async fn request(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    axum::Json(body): axum::Json<RequestConnectionRequest>,
) -> ApiResult<Connection> {
    let edge = connections::request_connection(&state.pool, actor, body.target_user_id).await?;
    Ok(axum::Json(edge))
}

#[derive(Deserialize)]
pub struct RespondConnectionRequest {
    pub status: ConnectionStatus,
}

pub async fn respond(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<ConnectionId>,
    axum::Json(body): axum::Json<RespondConnectionRequest>,
) -> ApiResult<Connection> {
    let edge = connections::respond(&state.pool, actor, id, body.status).await?;
    Ok(axum::Json(edge))
}

pub async fn list(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> ApiResult<Vec<Connection>> {
    let edges = connections::list(&state.pool, actor).await?;
    Ok(axum::Json(edges))
}
