//! Component attach/detach routes (spec.md §4.1, invariants I3/I6/I7).

use {
    crate::{ApiResult, AppState, auth::AuthenticatedUser},
    axum::extract::{Path, State},
    model::{
        ids::{PropertyComponentId, PropertyId},
        PropertyComponent,
    },
    serde::Deserialize,
};

#[derive(Deserialize)]
pub struct AttachRequest {
    pub child_id: PropertyId,
    pub position: Option<String>,
    pub attachment_type: Option<String>,
}

pub async fn attach(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(parent_id): Path<PropertyId>,
    axum::Json(body): axum::Json<AttachRequest>,
) -> ApiResult<PropertyComponent> {
    let edge = registry::attach(
        &state.pool,
        actor,
        parent_id,
        body.child_id,
        body.position,
        body.attachment_type,
    )
    .await?;
    Ok(axum::Json(edge))
}

pub async fn detach_by_child(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(child_id): Path<PropertyId>,
) -> ApiResult<PropertyComponent> {
    let edge = registry::detach(&state.pool, actor, child_id).await?;
    Ok(axum::Json(edge))
}

pub async fn detach_by_edge_id(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(edge_id): Path<PropertyComponentId>,
) -> ApiResult<PropertyComponent> {
    let edge = registry::detach_by_id(&state.pool, actor, edge_id).await?;
    Ok(axum::Json(edge))
}
