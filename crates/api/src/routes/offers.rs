//! Transfer Engine routes, Offer submode (spec.md §4.2/§6).

use {
    crate::{ApiResult, AppState, auth::AuthenticatedUser},
    axum::extract::{Path, State},
    model::ids::{OfferId, PropertyId, UserId},
    serde::Deserialize,
    transfers::TransferOffer,
};

#[derive(Deserialize)]
pub struct CreateOfferRequest {
    pub property_id: PropertyId,
    pub recipients: Vec<UserId>,
    #[serde(default)]
    pub include_components: bool,
    pub notes: Option<String>,
    /// Falls back to `AppState::default_offer_horizon_days` when omitted
    /// (spec.md §5).
    pub expires_in_days: Option<i64>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    axum::Json(body): axum::Json<CreateOfferRequest>,
) -> ApiResult<TransferOffer> {
    let expires_in_days = body
        .expires_in_days
        .or(Some(state.default_offer_horizon_days));
    let offer = transfers::create_offer(
        &state.pool,
        actor,
        body.property_id,
        body.recipients,
        body.include_components,
        body.notes,
        expires_in_days,
    )
    .await?;
    Ok(axum::Json(offer))
}

pub async fn accept(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<OfferId>,
) -> ApiResult<TransferOffer> {
    let offer = transfers::accept_offer(&state.pool, actor, id).await?;
    Ok(axum::Json(offer))
}

pub async fn reject(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<OfferId>,
) -> Result<axum::http::StatusCode, crate::ApiError> {
    transfers::reject_offer_recipient(&state.pool, actor, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn cancel(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<OfferId>,
) -> ApiResult<TransferOffer> {
    let offer = transfers::cancel_offer(&state.pool, actor, id).await?;
    Ok(axum::Json(offer))
}

pub async fn list_active(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> ApiResult<Vec<TransferOffer>> {
    let offers = transfers::list_active_offers_for(&state.pool, actor).await?;
    Ok(axum::Json(offers))
}
