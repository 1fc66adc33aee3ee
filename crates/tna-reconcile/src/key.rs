use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Namespace for match-id derivation. Changing it changes every published id.
const MATCH_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2d3a_9b4e_5f60_8a71_c2d3_e4f5_a6b7);

/// Source-agnostic match identity: normalized participant set + UTC match day.
///
/// The day is far wider than the matching tolerance, so a pre-match start and
/// an in-play start for the same match land on the same key unless they
/// straddle midnight UTC. Used for id derivation only; never published.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchKey {
    pub participants: Vec<String>,
    pub day: NaiveDate,
}

impl MatchKey {
    pub fn new(participants: Vec<String>, start: DateTime<Utc>) -> Self {
        Self {
            participants,
            day: start.date_naive(),
        }
    }

    fn canonical(&self) -> String {
        format!("{}@{}", self.participants.join("|"), self.day)
    }

    /// Deterministic id: the same key always yields the same UUID (v5).
    pub fn match_id(&self) -> Uuid {
        Uuid::new_v5(&MATCH_ID_NAMESPACE, self.canonical().as_bytes())
    }

    /// Id for the `ordinal`-th match sharing this key on the same day.
    /// Ordinal 0 is the base id.
    pub(crate) fn nth_id(&self, ordinal: usize) -> Uuid {
        if ordinal == 0 {
            return self.match_id();
        }
        let name = format!("{}#{}", self.canonical(), ordinal);
        Uuid::new_v5(&MATCH_ID_NAMESPACE, name.as_bytes())
    }
}
