//! Offline-sync contract (spec.md §6): clients POST queue entries keyed by
//! `(client_id, entity_kind, op)` accumulated while offline; the server
//! resolves each idempotently and reports `{applied, conflict, rejected}`.
//! Only the `property` entity kind has a resolution path wired up today —
//! everything else is durably queued and reported `rejected` with an
//! explanation, since this service has no offline client for any other
//! entity kind yet.

use {
    crate::{ApiResult, AppState, auth::AuthenticatedUser},
    axum::extract::{Path, State},
    database::sync_queue::{self, SyncOp, SyncQueueEntry, SyncQueueStatus},
    model::{NewProperty, PropertyPatch},
    serde::{Deserialize, Serialize},
};

#[derive(Deserialize)]
pub struct SyncSubmission {
    pub client_id: String,
    pub op: SyncOp,
    pub entity_kind: String,
    pub entity_id: Option<i64>,
    pub payload: serde_json::Value,
}

#[derive(Serialize)]
pub struct SyncResolution {
    pub client_id: String,
    pub status: &'static str,
    pub entity_id: Option<i64>,
    /// The server's current `version` for this entity. Populated on
    /// `conflict` so the client can re-fetch and re-apply its change
    /// against the value that actually won (spec.md §6).
    pub current_version: Option<i64>,
    pub error: Option<String>,
}

struct SyncOutcome {
    status: SyncQueueStatus,
    entity_id: Option<i64>,
    current_version: Option<i64>,
}

#[derive(Deserialize)]
struct PropertyUpdatePayload {
    #[serde(flatten)]
    patch: PropertyPatch,
    expected_version: i64,
}

async fn resolve_property_op(
    state: &AppState,
    actor: model::ids::UserId,
    op: SyncOp,
    entity_id: Option<i64>,
    payload: &serde_json::Value,
) -> Result<SyncOutcome, String> {
    match op {
        SyncOp::Create => {
            let new: NewProperty =
                serde_json::from_value(payload.clone()).map_err(|e| e.to_string())?;
            let serial_number = new.serial_number.clone();
            match registry::create(&state.pool, actor, new).await {
                Ok(property) => Ok(SyncOutcome {
                    status: SyncQueueStatus::Applied,
                    entity_id: Some(property.id.get()),
                    current_version: Some(property.version),
                }),
                Err(model::Error::DuplicateSerial(_)) => {
                    let existing = registry::get_by_serial(&state.pool, &serial_number)
                        .await
                        .map_err(|e| e.to_string())?;
                    Ok(SyncOutcome {
                        status: SyncQueueStatus::Conflict,
                        entity_id: Some(existing.id.get()),
                        current_version: Some(existing.version),
                    })
                }
                Err(e) => Err(e.to_string()),
            }
        }
        SyncOp::Update => {
            let Some(entity_id) = entity_id else {
                return Err("update requires entity_id".to_string());
            };
            let update: PropertyUpdatePayload =
                serde_json::from_value(payload.clone()).map_err(|e| e.to_string())?;
            match registry::update(
                &state.pool,
                actor,
                model::ids::PropertyId::new(entity_id),
                update.patch,
                update.expected_version,
            )
            .await
            {
                Ok(property) => Ok(SyncOutcome {
                    status: SyncQueueStatus::Applied,
                    entity_id: Some(property.id.get()),
                    current_version: Some(property.version),
                }),
                Err(model::Error::VersionConflict { found, .. }) => Ok(SyncOutcome {
                    status: SyncQueueStatus::Conflict,
                    entity_id: Some(entity_id),
                    current_version: Some(found),
                }),
                Err(e) => Err(e.to_string()),
            }
        }
        SyncOp::Delete => Err("deleting a property through offline sync is not supported".to_string()),
    }
}

pub async fn submit(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    axum::Json(submissions): axum::Json<Vec<SyncSubmission>>,
) -> ApiResult<Vec<SyncResolution>> {
    let mut resolutions = Vec::with_capacity(submissions.len());

    for submission in submissions {
        let mut conn = state
            .pool
            .acquire()
            .await
            .map_err(|e| model::Error::Internal(e.into()))?;
        let entry: SyncQueueEntry = sync_queue::enqueue(
            &mut conn,
            &submission.client_id,
            submission.op,
            &submission.entity_kind,
            submission.entity_id,
            submission.payload.clone(),
        )
        .await
        .map_err(|e| model::Error::Internal(e.into()))?;
        drop(conn);

        let (status, entity_id, current_version, error) = if submission.entity_kind == "property" {
            match resolve_property_op(&state, actor, submission.op, submission.entity_id, &entry.payload.0)
                .await
            {
                Ok(outcome) => (outcome.status, outcome.entity_id, outcome.current_version, None),
                Err(message) => (SyncQueueStatus::Rejected, submission.entity_id, None, Some(message)),
            }
        } else {
            (
                SyncQueueStatus::Rejected,
                submission.entity_id,
                None,
                Some(format!("unsupported entity_kind '{}'", submission.entity_kind)),
            )
        };

        let mut conn = state
            .pool
            .acquire()
            .await
            .map_err(|e| model::Error::Internal(e.into()))?;
        sync_queue::mark(&mut conn, entry.id, status)
            .await
            .map_err(|e| model::Error::Internal(e.into()))?;

        resolutions.push(SyncResolution {
            client_id: submission.client_id,
            status: match status {
                SyncQueueStatus::Applied => "applied",
                SyncQueueStatus::Conflict => "conflict",
                SyncQueueStatus::Rejected => "rejected",
                SyncQueueStatus::Pending => "pending",
            },
            entity_id,
            current_version,
            error,
        });
    }

    Ok(axum::Json(resolutions))
}

pub async fn pending(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> ApiResult<Vec<SyncQueueEntry>> {
    let mut conn = state
        .pool
        .acquire()
        .await
        .map_err(|e| model::Error::Internal(e.into()))?;
    let pending = sync_queue::pending_for_client(&mut conn, &client_id)
        .await
        .map_err(|e| model::Error::Internal(e.into()))?;
    Ok(axum::Json(pending))
}
