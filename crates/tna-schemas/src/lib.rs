//! tna-schemas
//!
//! Shared record shapes for the tennis aggregator: per-feed raw records,
//! the unified match entity and the published snapshot.
//!
//! No logic beyond constructors and lookups lives here.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Odds / metadata fields keyed by field name. Ordered so serialized output
/// is stable.
pub type FieldMap = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Feed tags
// ---------------------------------------------------------------------------

/// Compile-time marker for one upstream feed.
pub trait SourceTag: fmt::Debug + Clone + Copy + PartialEq + Eq + Send + Sync + 'static {
    /// Stable feed name used in logs, snapshots and error messages.
    const NAME: &'static str;
    /// Provenance given to an entity built from this feed alone.
    const SINGLE_PROVENANCE: Provenance;
}

/// Pre-match feed (source A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prematch {}

/// In-play feed (source B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inplay {}

impl SourceTag for Prematch {
    const NAME: &'static str = "prematch";
    const SINGLE_PROVENANCE: Provenance = Provenance::PrematchOnly;
}

impl SourceTag for Inplay {
    const NAME: &'static str = "inplay";
    const SINGLE_PROVENANCE: Provenance = Provenance::InplayOnly;
}

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// One match record exactly as a feed described it.
///
/// Participants and start time are optional here: adapters hand over whatever
/// the provider sent and the reconciliation engine decides what is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord<S> {
    /// Opaque provider id, unique within one feed.
    pub provider_id: String,
    /// Participant names in the provider's own formatting.
    pub participants: Vec<String>,
    /// Scheduled / actual start in the provider's own UTC offset.
    pub start_time: Option<DateTime<FixedOffset>>,
    pub fields: FieldMap,
    _feed: PhantomData<fn() -> S>,
}

impl<S: SourceTag> RawRecord<S> {
    pub fn new(
        provider_id: impl Into<String>,
        participants: Vec<String>,
        start_time: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            participants,
            start_time,
            fields: FieldMap::new(),
            _feed: PhantomData,
        }
    }

    /// Builder-style field insert.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn source_name(&self) -> &'static str {
        S::NAME
    }
}

// ---------------------------------------------------------------------------
// MatchEntity
// ---------------------------------------------------------------------------

/// Which feed(s) contributed an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Matched,
    PrematchOnly,
    InplayOnly,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Matched => "matched",
            Provenance::PrematchOnly => "prematch_only",
            Provenance::InplayOnly => "inplay_only",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider ids of the records an entity was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIds {
    pub prematch_id: Option<String>,
    pub inplay_id: Option<String>,
}

/// The unified, externally visible match record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntity {
    /// Stable synthetic id derived from the normalized match identity.
    pub match_id: Uuid,
    /// Display names as reported by the contributing feed.
    pub participants: Vec<String>,
    /// Normalized participant keys (sorted).
    pub participant_keys: Vec<String>,
    /// Canonical start time (UTC).
    pub start_time: DateTime<Utc>,
    pub provenance: Provenance,
    pub sources: SourceIds,
    pub fields: FieldMap,
    /// Values that lost a field-precedence decision, keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub superseded: FieldMap,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One complete, immutable result of a refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Publication counter. `0` is the boot placeholder that no cycle produced.
    pub version: u64,
    pub captured_at: DateTime<Utc>,
    /// Feeds that failed during the producing cycle.
    pub degraded: Vec<String>,
    /// Records dropped as malformed during the producing merge.
    pub skipped_records: usize,
    pub matches: Vec<MatchEntity>,
}

impl Snapshot {
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            version: 0,
            captured_at,
            degraded: Vec::new(),
            skipped_records: 0,
            matches: Vec::new(),
        }
    }

    pub fn find(&self, match_id: &Uuid) -> Option<&MatchEntity> {
        self.matches.iter().find(|m| &m.match_id == match_id)
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}
