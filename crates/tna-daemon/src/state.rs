//! Shared runtime state for tna-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself
//! beyond the heartbeat task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tna_schemas::Snapshot;
use tokio::sync::{broadcast, watch, RwLock};

use crate::refresh::CycleState;

// ---------------------------------------------------------------------------
// BusMsg (SSE event bus payload)
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    SnapshotPublished {
        version: u64,
        matches: usize,
        degraded: Vec<String>,
        skipped_records: usize,
    },
    CycleAborted {
        cycle: u64,
        error: String,
        consecutive_failures: u32,
    },
}

impl BusMsg {
    /// SSE `event:` name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::SnapshotPublished { .. } => "snapshot",
            BusMsg::CycleAborted { .. } => "cycle",
        }
    }
}

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Holder of the most recently published snapshot.
///
/// Readers clone the inner `Arc` and never block the writer; a publication
/// replaces the whole snapshot in one step, so a reader sees either the old
/// or the new one, never a mix.
#[derive(Clone)]
pub struct SnapshotStore {
    tx: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// Starts with the empty version-0 placeholder.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::empty(Utc::now())));
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Stamp `next` with the following version and make it current.
    pub fn publish(&self, mut next: Snapshot) -> Arc<Snapshot> {
        let mut published = None;
        self.tx.send_modify(|cur| {
            next.version = cur.version + 1;
            let arc = Arc::new(next);
            published = Some(Arc::clone(&arc));
            *cur = arc;
        });
        match published {
            Some(snap) => snap,
            None => self.current(),
        }
    }

    /// Receiver notified on every publication.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// RefreshStatus
// ---------------------------------------------------------------------------

/// Refresh-loop bookkeeping, returned inside GET /v1/status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub state: CycleState,
    pub cycles_started: u64,
    pub cycles_published: u64,
    pub cycles_aborted: u64,
    pub consecutive_failures: u32,
    /// "published" | "aborted"
    pub last_outcome: Option<String>,
    pub last_error: Option<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_published_version: u64,
}

impl Default for RefreshStatus {
    fn default() -> Self {
        Self {
            state: CycleState::Idle,
            cycles_started: 0,
            cycles_published: 0,
            cycles_aborted: 0,
            consecutive_failures: 0,
            last_outcome: None,
            last_error: None,
            last_cycle_at: None,
            last_published_version: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers and the refresh loop.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub store: SnapshotStore,
    pub refresh: Arc<RwLock<RefreshStatus>>,
    /// Hash of the layered config the daemon booted with, if any.
    pub config_hash: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "tna-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            store: SnapshotStore::new(),
            refresh: Arc::new(RwLock::new(RefreshStatus::default())),
            config_hash: None,
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Emit a heartbeat on the bus every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_stamps_consecutive_versions() {
        let store = SnapshotStore::new();
        assert_eq!(store.current().version, 0);

        let first = store.publish(Snapshot::empty(Utc::now()));
        let second = store.publish(Snapshot::empty(Utc::now()));
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(store.current().version, 2);
    }

    #[test]
    fn readers_keep_their_snapshot_across_publication() {
        let store = SnapshotStore::new();
        let held = store.current();
        store.publish(Snapshot::empty(Utc::now()));
        assert_eq!(held.version, 0);
        assert_eq!(store.current().version, 1);
    }

    #[test]
    fn subscriber_sees_publication() {
        let store = SnapshotStore::new();
        let mut rx = store.subscribe();
        store.publish(Snapshot::empty(Utc::now()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().version, 1);
    }

    #[test]
    fn bus_event_names() {
        let m = BusMsg::CycleAborted {
            cycle: 3,
            error: "x".into(),
            consecutive_failures: 1,
        };
        assert_eq!(m.event_name(), "cycle");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["type"], "cycle_aborted");
    }
}
