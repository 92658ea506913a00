//! Append-Only Event Ledger routes (spec.md §4.4/§6). Read-only: the ledger
//! is written only as a side effect of other domain crates' mutations,
//! never directly through this API.

use {
    crate::{ApiError, ApiResult, AppState},
    axum::extract::{Path, Query, State},
    ledger::HistoryFilter,
    model::{
        ids::PropertyId,
        ledger::{EventKind, IntegrityReport, LedgerEvent},
    },
    serde::Deserialize,
};

fn internal(e: sqlx::Error) -> ApiError {
    model::Error::Internal(e.into()).into()
}

pub async fn item_history(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
) -> ApiResult<Vec<LedgerEvent>> {
    let mut conn = state.pool.acquire().await.map_err(internal)?;
    let events = ledger::history_for_item(&mut conn, id).await.map_err(internal)?;
    Ok(axum::Json(events))
}

#[derive(Deserialize)]
pub struct GeneralHistoryQuery {
    pub kind: Option<EventKind>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn general_history(
    State(state): State<AppState>,
    Query(query): Query<GeneralHistoryQuery>,
) -> ApiResult<Vec<LedgerEvent>> {
    let mut conn = state.pool.acquire().await.map_err(internal)?;
    let events = ledger::general_history(
        &mut conn,
        HistoryFilter {
            kind: query.kind,
            limit: query.limit,
            offset: query.offset,
        },
    )
    .await
    .map_err(internal)?;
    Ok(axum::Json(events))
}

pub async fn verify_integrity(State(state): State<AppState>) -> ApiResult<IntegrityReport> {
    let mut conn = state.pool.acquire().await.map_err(internal)?;
    let report = ledger::verify_integrity(&mut conn).await.map_err(internal)?;
    Ok(axum::Json(report))
}
