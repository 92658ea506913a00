//! Tracing/metrics bootstrap, trimmed from the teacher's `observe` crate to
//! the slice `api` actually uses: env-filtered `tracing-subscriber` output
//! plus a `tower-http` tracing layer that stamps each request with a
//! correlation id. Dropped the teacher's `opentelemetry` exporter,
//! `tokio-console` support, and allocator-profiling endpoints — this
//! service has no distributed tracing backend or allocator-profiling
//! requirement to justify carrying them (see DESIGN.md).

use {
    axum::{extract::Request, http::HeaderValue},
    std::time::Duration,
    tracing::Span,
};

/// Initializes the global `tracing` subscriber from `RUST_LOG`, defaulting
/// to `info` when unset. Idempotent-enough for tests: returns `Err` instead
/// of panicking if a subscriber is already installed.
pub fn init_tracing(env_filter_default: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(env_filter_default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

pub const TRACE_ID_HEADER: &str = "x-request-id";

/// Span-builder for `tower_http::trace::TraceLayer::make_span_with`;
/// `api::serve` wires this into `TraceLayer::new_for_http()` directly
/// rather than this crate naming the layer's full generic type.
pub fn make_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// Stamps `x-request-id` on the response if the request didn't already
/// carry one, so callers can correlate logs with a response even when they
/// didn't supply their own id.
pub fn ensure_request_id(headers: &mut axum::http::HeaderMap) {
    if !headers.contains_key(TRACE_ID_HEADER) {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            headers.insert(TRACE_ID_HEADER, value);
        }
    }
}

/// Shared Prometheus registry for handlers to register counters/histograms
/// against; `api::serve` exposes it on `/metrics`.
pub fn metrics_registry() -> prometheus::Registry {
    prometheus::Registry::new_custom(Some("property_registry".to_string()), None)
        .expect("static registry prefix is valid")
}

pub fn slow_request_threshold() -> Duration {
    Duration::from_millis(500)
}
