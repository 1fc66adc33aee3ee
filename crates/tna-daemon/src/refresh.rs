//! Refresh loop: fetch both feeds, merge, publish, wait, repeat.
//!
//! ```text
//! Fetching -> Merging -> Publishing -> Idle --(interval)--> Fetching
//!     \__________\______ abort ______> Backoff --(backoff)--> Fetching
//! ```
//!
//! One feed failing degrades the cycle (the survivor is merged alone and the
//! snapshot lists the failed feed). Both failing, or the merge itself failing,
//! aborts the cycle: nothing is published and the previous snapshot stays.
//! The loop itself never terminates on error; only the shutdown signal
//! stops it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tna_config::AggregatorConfig;
use tna_reconcile::{MatchingConfig, MergeOutput};
use tna_schemas::{Inplay, Prematch, RawRecord, Snapshot, SourceTag};
use tna_sources::{fetch_with_timeout, Source, SourceError};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::state::{AppState, BusMsg};

/// Signature of the merge step. `tna_reconcile::merge` in production.
pub type MergeFn = fn(&[RawRecord<Prematch>], &[RawRecord<Inplay>], &MatchingConfig) -> MergeOutput;

// ---------------------------------------------------------------------------
// CycleState
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Fetching,
    Merging,
    Publishing,
    /// Normal cooldown after a publication.
    Idle,
    /// Short cooldown after an aborted cycle.
    Backoff,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Fetching => "fetching",
            CycleState::Merging => "merging",
            CycleState::Publishing => "publishing",
            CycleState::Idle => "idle",
            CycleState::Backoff => "backoff",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Errors / reports
// ---------------------------------------------------------------------------

/// A cycle that published nothing. The previous snapshot stays current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAborted {
    AllSourcesFailed {
        prematch: SourceError,
        inplay: SourceError,
    },
    /// The merge task panicked or was cancelled.
    MergeFailed(String),
}

impl fmt::Display for CycleAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleAborted::AllSourcesFailed { prematch, inplay } => {
                write!(f, "all sources failed: {prematch}; {inplay}")
            }
            CycleAborted::MergeFailed(msg) => write!(f, "merge failed: {msg}"),
        }
    }
}

impl std::error::Error for CycleAborted {}

/// Outcome of a published cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub version: u64,
    pub matches: usize,
    pub matched: usize,
    pub prematch_only: usize,
    pub inplay_only: usize,
    pub skipped_records: usize,
    /// Feeds that failed this cycle.
    pub degraded: Vec<&'static str>,
}

/// Loop timing and matching parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    pub interval: Duration,
    pub backoff: Duration,
    pub fetch_timeout: Duration,
    pub matching: MatchingConfig,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AggregatorConfig::default())
    }
}

impl LoopSettings {
    pub fn from_config(cfg: &AggregatorConfig) -> Self {
        Self {
            interval: cfg.refresh.interval(),
            backoff: cfg.refresh.backoff(),
            fetch_timeout: cfg.refresh.fetch_timeout(),
            matching: MatchingConfig::with_tolerance_secs(cfg.matching.time_tolerance_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// RefreshLoop
// ---------------------------------------------------------------------------

pub struct RefreshLoop {
    prematch: Arc<dyn Source<Tag = Prematch>>,
    inplay: Arc<dyn Source<Tag = Inplay>>,
    settings: LoopSettings,
    state: Arc<AppState>,
    merge_fn: MergeFn,
}

fn join_failed(feed: &'static str, err: JoinError) -> SourceError {
    SourceError::unavailable(feed, format!("fetch task failed: {err}"))
}

impl RefreshLoop {
    pub fn new(
        prematch: Arc<dyn Source<Tag = Prematch>>,
        inplay: Arc<dyn Source<Tag = Inplay>>,
        settings: LoopSettings,
        state: Arc<AppState>,
    ) -> Self {
        Self {
            prematch,
            inplay,
            settings,
            state,
            merge_fn: tna_reconcile::merge,
        }
    }

    /// Replace the merge step. Used to exercise the merge-failure path.
    pub fn with_merge_fn(mut self, merge_fn: MergeFn) -> Self {
        self.merge_fn = merge_fn;
        self
    }

    async fn enter(&self, next: CycleState) {
        self.state.refresh.write().await.state = next;
    }

    /// Run one cycle and record its outcome in the shared status. On return
    /// the status is `Idle` (published) or `Backoff` (aborted).
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleAborted> {
        let cycle = {
            let mut st = self.state.refresh.write().await;
            st.cycles_started += 1;
            st.state = CycleState::Fetching;
            st.cycles_started
        };

        let result = self.cycle().await;

        let mut st = self.state.refresh.write().await;
        st.last_cycle_at = Some(Utc::now());
        match &result {
            Ok(report) => {
                st.state = CycleState::Idle;
                st.cycles_published += 1;
                st.consecutive_failures = 0;
                st.last_outcome = Some("published".to_string());
                st.last_error = None;
                st.last_published_version = report.version;
            }
            Err(err) => {
                st.state = CycleState::Backoff;
                st.cycles_aborted += 1;
                st.consecutive_failures = st.consecutive_failures.saturating_add(1);
                st.last_outcome = Some("aborted".to_string());
                st.last_error = Some(err.to_string());
                let _ = self.state.bus.send(BusMsg::CycleAborted {
                    cycle,
                    error: err.to_string(),
                    consecutive_failures: st.consecutive_failures,
                });
            }
        }
        result
    }

    async fn cycle(&self) -> Result<CycleReport, CycleAborted> {
        // Each fetch runs on its own task so a panicking adapter is contained
        // like any other adapter failure.
        let timeout = self.settings.fetch_timeout;
        let pre = Arc::clone(&self.prematch);
        let inp = Arc::clone(&self.inplay);
        let pre_task = tokio::spawn(async move { fetch_with_timeout(&*pre, timeout).await });
        let inp_task = tokio::spawn(async move { fetch_with_timeout(&*inp, timeout).await });

        let (pre_res, inp_res) = tokio::join!(pre_task, inp_task);
        let pre_res = pre_res.unwrap_or_else(|e| Err(join_failed(Prematch::NAME, e)));
        let inp_res = inp_res.unwrap_or_else(|e| Err(join_failed(Inplay::NAME, e)));

        let mut degraded: Vec<&'static str> = Vec::new();
        let (a, b) = match (pre_res, inp_res) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(err), Ok(b)) => {
                warn!(feed = err.feed(), kind = err.kind(), error = %err, "source failed; merging survivor");
                degraded.push(err.feed());
                (Vec::new(), b)
            }
            (Ok(a), Err(err)) => {
                warn!(feed = err.feed(), kind = err.kind(), error = %err, "source failed; merging survivor");
                degraded.push(err.feed());
                (a, Vec::new())
            }
            (Err(prematch), Err(inplay)) => {
                return Err(CycleAborted::AllSourcesFailed { prematch, inplay });
            }
        };
        debug!(prematch = a.len(), inplay = b.len(), "fetched");

        self.enter(CycleState::Merging).await;
        let matching = self.settings.matching.clone();
        let merge_fn = self.merge_fn;
        let out = tokio::task::spawn_blocking(move || merge_fn(&a, &b, &matching))
            .await
            .map_err(|e| CycleAborted::MergeFailed(e.to_string()))?;

        for skipped in &out.report.skipped {
            debug!(%skipped, "record skipped");
        }

        self.enter(CycleState::Publishing).await;
        let report = out.report;
        let matches = out.entities.len();
        let snapshot = Snapshot {
            version: 0,
            captured_at: Utc::now(),
            degraded: degraded.iter().map(|s| s.to_string()).collect(),
            skipped_records: report.skipped.len(),
            matches: out.entities,
        };
        let published = self.state.store.publish(snapshot);

        let _ = self.state.bus.send(BusMsg::SnapshotPublished {
            version: published.version,
            matches,
            degraded: published.degraded.clone(),
            skipped_records: published.skipped_records,
        });

        Ok(CycleReport {
            version: published.version,
            matches,
            matched: report.matched,
            prematch_only: report.prematch_only,
            inplay_only: report.inplay_only,
            skipped_records: report.skipped.len(),
            degraded,
        })
    }

    /// Drive cycles until `shutdown` turns `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            backoff_secs = self.settings.backoff.as_secs(),
            "refresh loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        version = report.version,
                        matches = report.matches,
                        matched = report.matched,
                        prematch_only = report.prematch_only,
                        inplay_only = report.inplay_only,
                        skipped = report.skipped_records,
                        degraded = ?report.degraded,
                        "snapshot published"
                    );
                    self.settings.interval
                }
                Err(err) => {
                    warn!(error = %err, backoff_secs = self.settings.backoff.as_secs(), "cycle aborted; keeping previous snapshot");
                    self.settings.backoff
                }
            };

            if cooldown(delay, &mut shutdown).await {
                break;
            }
        }

        info!("refresh loop stopped");
    }
}

/// Wait out `delay`. Returns `true` as soon as shutdown is requested or the
/// sender is gone; a change back to `false` keeps waiting on the same deadline.
async fn cooldown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}

pub fn spawn_refresh_loop(refresh: RefreshLoop, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(refresh.run(shutdown))
}
