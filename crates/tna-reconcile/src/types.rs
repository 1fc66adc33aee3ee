use std::fmt;
use std::time::Duration;

use tna_schemas::MatchEntity;

/// Default start-time tolerance: provider clocks and schedule updates
/// routinely disagree by a couple of minutes.
pub const DEFAULT_TIME_TOLERANCE_SECS: u64 = 300;

/// Tunables for matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Two records with equal participant sets match when their start times
    /// differ by at most this much (inclusive).
    pub time_tolerance: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            time_tolerance: Duration::from_secs(DEFAULT_TIME_TOLERANCE_SECS),
        }
    }
}

impl MatchingConfig {
    pub fn with_tolerance_secs(secs: u64) -> Self {
        Self {
            time_tolerance: Duration::from_secs(secs),
        }
    }

    pub(crate) fn tolerance_secs(&self) -> i64 {
        i64::try_from(self.time_tolerance.as_secs()).unwrap_or(i64::MAX)
    }
}

/// Why a record could not take part in the merge.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MalformedReason {
    /// Fewer than two usable participant names.
    MissingParticipants,
    MissingStartTime,
}

/// A record dropped from the merge. Per-record and recoverable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordMalformed {
    pub source: &'static str,
    pub provider_id: String,
    pub reason: MalformedReason,
}

impl fmt::Display for RecordMalformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let why = match self.reason {
            MalformedReason::MissingParticipants => "missing participants",
            MalformedReason::MissingStartTime => "missing start time",
        };
        write!(
            f,
            "malformed {} record id={}: {}",
            self.source, self.provider_id, why
        )
    }
}

impl std::error::Error for RecordMalformed {}

/// Counters for one merge. `matched` counts pairs (two input records each).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub matched: usize,
    pub prematch_only: usize,
    pub inplay_only: usize,
    /// Sorted for deterministic output.
    pub skipped: Vec<RecordMalformed>,
}

impl MergeReport {
    /// Input records represented in the output.
    pub fn represented_records(&self) -> usize {
        self.matched * 2 + self.prematch_only + self.inplay_only
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutput {
    /// Ordered by start time, then match id.
    pub entities: Vec<MatchEntity>,
    pub report: MergeReport,
}
