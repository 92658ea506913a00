//! Property Registry routes (spec.md §4.1/§6).

use {
    crate::{ApiResult, AppState, auth::AuthenticatedUser},
    axum::extract::{Path, Query, State},
    model::{ids::PropertyId, NewProperty, Property, PropertyFilter, PropertyPatch},
    serde::Deserialize,
};

pub async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    axum::Json(new): axum::Json<NewProperty>,
) -> ApiResult<Property> {
    let property = registry::create(&state.pool, actor, new).await?;
    Ok(axum::Json(property))
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<PropertyFilter>,
) -> ApiResult<Vec<Property>> {
    let properties = registry::list(&state.pool, &filter).await?;
    Ok(axum::Json(properties))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
) -> ApiResult<Property> {
    let property = registry::get_by_id(&state.pool, id).await?;
    Ok(axum::Json(property))
}

pub async fn get_by_serial(
    State(state): State<AppState>,
    Path(serial_number): Path<String>,
) -> ApiResult<Property> {
    let property = registry::get_by_serial(&state.pool, &serial_number).await?;
    Ok(axum::Json(property))
}

/// `PropertyPatch`'s fields flattened alongside the optimistic-concurrency
/// token (spec.md §4.1: every mutation carries the version it read).
#[derive(Deserialize)]
pub struct UpdatePropertyRequest {
    #[serde(flatten)]
    pub patch: PropertyPatch,
    pub expected_version: i64,
}

pub async fn update(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<PropertyId>,
    axum::Json(body): axum::Json<UpdatePropertyRequest>,
) -> ApiResult<Property> {
    let property = registry::update(&state.pool, actor, id, body.patch, body.expected_version).await?;
    Ok(axum::Json(property))
}
