//! Axum router and all HTTP handlers for tna-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers only read the snapshot store and status; they
//! never trigger a refresh.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tna_config::DaemonSettings;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use uuid::Uuid;

use crate::{
    api_types::{HealthResponse, MatchNotFoundResponse, MatchesResponse, StatusResponse},
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/matches", get(list_matches))
        .route("/matches/:match_id", get(get_match))
        .route("/api/tennis", get(list_matches))
        .route("/api/tennis/match/:match_id", get(get_match))
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

/// CORS: read-only (GET) access for the configured front-end origins.
pub fn cors_layer(daemon: &DaemonSettings) -> CorsLayer {
    let allow_origin = if daemon.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = daemon
            .cors_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers(Any)
}

// ---------------------------------------------------------------------------
// GET /matches
// ---------------------------------------------------------------------------

pub(crate) async fn list_matches(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.store.current();
    (
        StatusCode::OK,
        Json(MatchesResponse {
            timestamp: snap.captured_at,
            version: snap.version,
            degraded: snap.degraded.clone(),
            matches: snap.matches.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /matches/:match_id
// ---------------------------------------------------------------------------

pub(crate) async fn get_match(
    State(st): State<Arc<AppState>>,
    Path(match_id): Path<String>,
) -> Response {
    let snap = st.store.current();
    let found = Uuid::parse_str(match_id.trim())
        .ok()
        .and_then(|id| snap.find(&id));

    match found {
        Some(entity) => (StatusCode::OK, Json(entity.clone())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(MatchNotFoundResponse {
                error: "match not found".to_string(),
                match_id,
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.store.current();
    let refresh = st.refresh.read().await.clone();
    (
        StatusCode::OK,
        Json(StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            config_hash: st.config_hash.clone(),
            snapshot_version: snap.version,
            snapshot_captured_at: snap.captured_at,
            matches: snap.matches.len(),
            degraded: snap.degraded.clone(),
            refresh,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let events = broadcast_to_sse(st.bus.subscribe());
    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        // Lagged receivers skip what they missed.
        let m = msg.ok()?;
        let data = serde_json::to_string(&m).ok()?;
        Some(Ok(Event::default().event(m.event_name()).data(data)))
    })
}
