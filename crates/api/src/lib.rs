//! HTTP surface (spec.md §6). Thin: every handler below deserializes a
//! request, calls straight into a domain crate (`registry`, `transfers`,
//! `connections`, `notifications`, `ledger`, `ingestion`), and serializes
//! the result. No business logic lives here. Modeled on
//! `autopilot::infra::api::serve`: one `Router`, one `State`, one
//! `error_to_response`, graceful shutdown via a `oneshot::Receiver`.

pub mod auth;
pub mod routes;

use {
    axum::{
        Router,
        http::StatusCode,
        response::{IntoResponse, Json, Response},
        routing::{get, post},
    },
    catalog::CatalogLookup,
    ingestion::ocr::OcrClient,
    notifications::Dispatcher,
    prometheus::{Encoder, Registry, TextEncoder},
    rate_limit::Limiter,
    s3::Uploader,
    serde::Serialize,
    sqlx::PgPool,
    std::{net::SocketAddr, sync::Arc},
    tokio::sync::oneshot,
    tower_http::trace::TraceLayer,
};

/// Everything a handler needs, cloned cheaply per request (spec.md §9:
/// collaborators are explicit dependencies, injected here rather than
/// reached for as globals).
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: Arc<dyn CatalogLookup>,
    pub ocr: Arc<dyn OcrClient>,
    pub ocr_limiter: Arc<Limiter>,
    pub uploader: Arc<dyn Uploader>,
    pub dispatcher: Dispatcher,
    /// Default offer lifetime (spec.md §5) applied when a caller creates an
    /// offer without an explicit `expires_in_days`.
    pub default_offer_horizon_days: i64,
    pub metrics: Registry,
}

/// Wraps `model::Error` so handlers can return `Result<Json<T>, ApiError>`
/// and use `?` directly (spec.md §7/§8's status mapping lives entirely
/// here, at the one boundary that knows about HTTP).
pub struct ApiError(model::Error);

impl From<model::Error> for ApiError {
    fn from(err: model::Error) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

fn kind_name(kind: model::Kind) -> &'static str {
    match kind {
        model::Kind::ValidationError => "validation_error",
        model::Kind::NotFound => "not_found",
        model::Kind::DuplicateSerial => "duplicate_serial",
        model::Kind::AlreadyAccepted => "already_accepted",
        model::Kind::IllegalTransition => "illegal_transition",
        model::Kind::ComponentSplit => "component_split",
        model::Kind::NotPermitted => "not_permitted",
        model::Kind::VersionConflict => "version_conflict",
        model::Kind::IntegrityError => "integrity_error",
        model::Kind::UpstreamUnavailable => "upstream_unavailable",
        model::Kind::InternalError => "internal_error",
    }
}

/// spec.md §7/§8: the one place a `model::Kind` becomes an HTTP status.
fn status_for(kind: model::Kind) -> StatusCode {
    match kind {
        model::Kind::ValidationError => StatusCode::BAD_REQUEST,
        model::Kind::NotFound => StatusCode::NOT_FOUND,
        model::Kind::DuplicateSerial
        | model::Kind::AlreadyAccepted
        | model::Kind::IllegalTransition
        | model::Kind::ComponentSplit
        | model::Kind::VersionConflict => StatusCode::CONFLICT,
        model::Kind::NotPermitted => StatusCode::FORBIDDEN,
        model::Kind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        model::Kind::IntegrityError | model::Kind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error handling request");
        } else {
            tracing::debug!(error = %self.0, ?kind, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
                kind: kind_name(kind),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

async fn metrics_handler(axum::extract::State(state): axum::extract::State<AppState>) -> Response {
    let metric_families = state.metrics.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(%err, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([("content-type", encoder.format_type())], buffer).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/auth/login", post(routes::auth::login))
        .route(
            "/properties",
            get(routes::properties::list).post(routes::properties::create),
        )
        .route(
            "/properties/serial/{serial_number}",
            get(routes::properties::get_by_serial),
        )
        .route(
            "/properties/{id}",
            get(routes::properties::get_by_id).patch(routes::properties::update),
        )
        .route(
            "/properties/{id}/verify",
            post(routes::ingestion::verify_item),
        )
        .route(
            "/properties/{parent_id}/components",
            post(routes::components::attach),
        )
        .route(
            "/properties/components/{child_id}",
            axum::routing::delete(routes::components::detach_by_child),
        )
        .route(
            "/component-edges/{edge_id}",
            axum::routing::delete(routes::components::detach_by_edge_id),
        )
        .route("/transfers", post(routes::transfers::request))
        .route("/transfers/{id}/accept", post(routes::transfers::accept))
        .route("/transfers/{id}/reject", post(routes::transfers::reject))
        .route("/transfers/{id}/cancel", post(routes::transfers::cancel))
        .route("/offers", post(routes::offers::create))
        .route("/offers/active", get(routes::offers::list_active))
        .route("/offers/{id}/accept", post(routes::offers::accept))
        .route("/offers/{id}/reject", post(routes::offers::reject))
        .route("/offers/{id}/cancel", post(routes::offers::cancel))
        .route(
            "/connections",
            get(routes::connections::list).post(routes::connections::request),
        )
        .route(
            "/connections/{id}/respond",
            post(routes::connections::respond),
        )
        .route(
            "/notifications",
            get(routes::notifications::list),
        )
        .route(
            "/notifications/{id}/read",
            post(routes::notifications::mark_read),
        )
        .route(
            "/notifications/read-all",
            post(routes::notifications::mark_all_read),
        )
        .route("/ledger/item/{id}", get(routes::ledger::item_history))
        .route("/ledger/history", get(routes::ledger::general_history))
        .route("/ledger/verify", get(routes::ledger::verify_integrity))
        .route("/da2062/upload", post(routes::ingestion::upload_form))
        .route(
            "/imports/{form_id}/discard",
            post(routes::ingestion::discard_form),
        )
        .route("/sync", post(routes::sync::submit))
        .route("/sync/{client_id}/pending", get(routes::sync::pending))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(observe::make_span))
        .layer(tower_http::cors::CorsLayer::permissive())
}

/// Binds and serves the HTTP API until `shutdown` resolves (spec.md §6).
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: oneshot::Receiver<()>,
) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(?addr, "serving property-registry HTTP API");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown.await.ok();
        })
        .await
}
