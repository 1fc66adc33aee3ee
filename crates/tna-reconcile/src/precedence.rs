//! Field precedence for matched pairs.
//!
//! Fields reported by only one feed pass through unchanged. When both feeds
//! report the same field, [`FIELD_PRECEDENCE`] names the winner; the losing
//! value is kept in [`MergedFields::superseded`] so nothing is dropped.
//!
//! | Field           | Winner   |
//! |-----------------|----------|
//! | `status`        | inplay   |
//! | `score`         | inplay   |
//! | `live_odds`     | inplay   |
//! | `current_set`   | inplay   |
//! | `server`        | inplay   |
//! | `tournament`    | prematch |
//! | `league`        | prematch |
//! | `round`         | prematch |
//! | `surface`       | prematch |
//! | `prematch_odds` | prematch |
//! | `bet365_id`     | prematch |
//! | anything else   | inplay ([`DEFAULT_PRECEDENCE`]) |

use tna_schemas::FieldMap;

/// Which feed wins a field collision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precedence {
    Prematch,
    Inplay,
}

/// Live state belongs to the in-play feed; scheduling metadata to pre-match.
pub const FIELD_PRECEDENCE: &[(&str, Precedence)] = &[
    ("status", Precedence::Inplay),
    ("score", Precedence::Inplay),
    ("live_odds", Precedence::Inplay),
    ("current_set", Precedence::Inplay),
    ("server", Precedence::Inplay),
    ("tournament", Precedence::Prematch),
    ("league", Precedence::Prematch),
    ("round", Precedence::Prematch),
    ("surface", Precedence::Prematch),
    ("prematch_odds", Precedence::Prematch),
    ("bet365_id", Precedence::Prematch),
];

/// Unlisted fields go to the fresher feed.
pub const DEFAULT_PRECEDENCE: Precedence = Precedence::Inplay;

pub fn precedence_for(field: &str) -> Precedence {
    FIELD_PRECEDENCE
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_PRECEDENCE)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergedFields {
    pub fields: FieldMap,
    pub superseded: FieldMap,
}

/// Union of both field maps under the precedence table.
pub fn merge_fields(prematch: &FieldMap, inplay: &FieldMap) -> MergedFields {
    let mut out = MergedFields {
        fields: prematch.clone(),
        superseded: FieldMap::new(),
    };

    for (name, inplay_val) in inplay {
        let Some(prematch_val) = prematch.get(name) else {
            out.fields.insert(name.clone(), inplay_val.clone());
            continue;
        };
        if prematch_val == inplay_val {
            continue;
        }
        let (winner, loser) = match precedence_for(name) {
            Precedence::Inplay => (inplay_val, prematch_val),
            Precedence::Prematch => (prematch_val, inplay_val),
        };
        out.fields.insert(name.clone(), winner.clone());
        out.superseded.insert(name.clone(), loser.clone());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn table_lookup_and_default() {
        assert_eq!(precedence_for("status"), Precedence::Inplay);
        assert_eq!(precedence_for("tournament"), Precedence::Prematch);
        assert_eq!(precedence_for("something_new"), DEFAULT_PRECEDENCE);
    }

    #[test]
    fn table_has_no_duplicate_entries() {
        let mut names: Vec<&str> = FIELD_PRECEDENCE.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FIELD_PRECEDENCE.len());
    }

    #[test]
    fn single_source_fields_pass_through() {
        let pre = map(&[("tournament", json!("Vienna"))]);
        let inp = map(&[("score", json!("6-4"))]);
        let merged = merge_fields(&pre, &inp);
        assert_eq!(merged.fields.len(), 2);
        assert!(merged.superseded.is_empty());
    }

    #[test]
    fn collisions_follow_table_and_keep_loser() {
        let pre = map(&[
            ("status", json!("not_started")),
            ("tournament", json!("Erste Bank Open")),
        ]);
        let inp = map(&[("status", json!("live")), ("tournament", json!("ATP Vienna"))]);

        let merged = merge_fields(&pre, &inp);
        assert_eq!(merged.fields["status"], "live");
        assert_eq!(merged.fields["tournament"], "Erste Bank Open");
        assert_eq!(merged.superseded["status"], "not_started");
        assert_eq!(merged.superseded["tournament"], "ATP Vienna");
    }

    #[test]
    fn equal_values_are_not_superseded() {
        let pre = map(&[("status", json!("live"))]);
        let inp = map(&[("status", json!("live"))]);
        let merged = merge_fields(&pre, &inp);
        assert_eq!(merged.fields["status"], "live");
        assert!(merged.superseded.is_empty());
    }
}
