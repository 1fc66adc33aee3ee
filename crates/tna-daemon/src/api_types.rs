//! Request and response types for all tna-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tna_schemas::MatchEntity;

use crate::state::RefreshStatus;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub config_hash: Option<String>,
    pub snapshot_version: u64,
    pub snapshot_captured_at: DateTime<Utc>,
    pub matches: usize,
    pub degraded: Vec<String>,
    pub refresh: RefreshStatus,
}

// ---------------------------------------------------------------------------
// /matches  (alias /api/tennis)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesResponse {
    /// Capture time of the snapshot being served.
    pub timestamp: DateTime<Utc>,
    pub version: u64,
    pub degraded: Vec<String>,
    pub matches: Vec<MatchEntity>,
}

// ---------------------------------------------------------------------------
// /matches/:match_id  (alias /api/tennis/match/:match_id)
// ---------------------------------------------------------------------------

/// 404 body for an unknown or malformed match id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchNotFoundResponse {
    pub error: String,
    pub match_id: String,
}
