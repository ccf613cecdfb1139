use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{Next, from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use keel_configutil::{Listener, SharedConfig};
use keel_listenerutil::{ListenerCustomHeaders, ListenerError, XffConfig, custom_headers_middleware, forwarded_for_middleware};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub const REQUEST_HEADER: &str = "x-keel-request";

#[derive(Debug)]
pub(crate) struct AppState {
    cluster_name: Option<String>,
    sanitized: Map<String, Value>,
}

impl AppState {
    pub(crate) fn new(config: &SharedConfig) -> Self {
        Self { cluster_name: config.cluster_name.clone(), sanitized: config.sanitized() }
    }
}

/// Builds the router for one listener with its middleware stack applied.
///
/// Outermost first: custom response headers, tracing, forwarded-for handling, the
/// required request header, the body size limit and the request timeout.
pub(crate) fn listener_router(
    state: Arc<AppState>,
    listener: &Listener,
    default_max_request_duration: Option<Duration>,
) -> Result<Router, ListenerError> {
    let mut router = Router::new()
        .route("/v1/sys/health", get(health))
        .route("/v1/sys/config/state/sanitized", get(sanitized_config))
        .with_state(state);

    let timeout = match listener.max_request_duration {
        Some(d) if !d.is_zero() => d,
        _ => default_max_request_duration
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| listener.effective_max_request_duration()),
    };
    router = router.layer(TimeoutLayer::with_status_code(StatusCode::SERVICE_UNAVAILABLE, timeout));

    if let Some(limit) = listener.effective_max_request_size() {
        router = router.layer(RequestBodyLimitLayer::new(usize::try_from(limit).unwrap_or(usize::MAX)));
    }
    if listener.require_request_header {
        router = router.layer(from_fn(require_request_header));
    }
    if let Some(xff) = XffConfig::from_listener(listener) {
        router = router.layer(from_fn_with_state(Arc::new(xff), forwarded_for_middleware));
    }
    router = router.layer(TraceLayer::new_for_http());

    let headers = ListenerCustomHeaders::new(listener)?;
    if !headers.is_empty() {
        router = router.layer(from_fn_with_state(Arc::new(headers), custom_headers_middleware));
    }

    debug!(
        address = listener.address.as_deref().unwrap_or_default(),
        timeout_secs = timeout.as_secs(),
        "Built listener router"
    );
    Ok(router)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "initialized": true,
        "cluster_name": state.cluster_name,
        "server_time_utc": chrono::Utc::now().timestamp(),
    }))
}

async fn sanitized_config(State(state): State<Arc<AppState>>) -> Json<Map<String, Value>> {
    Json(state.sanitized.clone())
}

async fn require_request_header(request: Request, next: Next) -> Response {
    if request.headers().contains_key(REQUEST_HEADER) {
        return next.run(request).await;
    }
    (StatusCode::PRECONDITION_FAILED, format!("missing '{REQUEST_HEADER}' header")).into_response()
}
