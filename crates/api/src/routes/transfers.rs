//! Transfer Engine routes, Request submode (spec.md §4.2/§6).

use {
    crate::{ApiResult, AppState, auth::AuthenticatedUser},
    axum::extract::{Path, State},
    model::{error::Error, ids::TransferId},
    serde::Deserialize,
    transfers::Transfer,
};

/// Either `property_id` or `serial_number` must be set (spec.md §6: "request
/// by id or by serial").
#[derive(Deserialize)]
pub struct RequestTransferRequest {
    pub property_id: Option<model::ids::PropertyId>,
    pub serial_number: Option<String>,
    #[serde(default)]
    pub include_components: bool,
    pub notes: Option<String>,
}

pub async fn request(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    axum::Json(body): axum::Json<RequestTransferRequest>,
) -> ApiResult<Transfer> {
    let transfer = match (body.property_id, body.serial_number) {
        (Some(property_id), _) => {
            transfers::request_by_id(&state.pool, actor, property_id, body.include_components, body.notes)
                .await?
        }
        (None, Some(serial_number)) => {
            transfers::request_by_serial(
                &state.pool,
                actor,
                &serial_number,
                body.include_components,
                body.notes,
            )
            .await?
        }
        (None, None) => {
            return Err(Error::validation("either property_id or serial_number is required").into());
        }
    };
    Ok(axum::Json(transfer))
}

pub async fn accept(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<TransferId>,
) -> ApiResult<Transfer> {
    let transfer = transfers::accept(&state.pool, actor, id).await?;
    Ok(axum::Json(transfer))
}

#[derive(Deserialize, Default)]
pub struct RejectTransferRequest {
    pub reason: Option<String>,
}

pub async fn reject(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<TransferId>,
    body: Option<axum::Json<RejectTransferRequest>>,
) -> ApiResult<Transfer> {
    let reason = body.map(|b| b.0.reason).unwrap_or_default();
    let transfer = transfers::reject(&state.pool, actor, id, reason).await?;
    Ok(axum::Json(transfer))
}

pub async fn cancel(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<TransferId>,
) -> ApiResult<Transfer> {
    let transfer = transfers::cancel(&state.pool, actor, id).await?;
    Ok(axum::Json(transfer))
}
