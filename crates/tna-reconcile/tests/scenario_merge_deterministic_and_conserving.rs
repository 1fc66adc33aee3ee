//! Scenario: merge is idempotent, conserving and id-unique.
//!
//! # Invariants under test
//!
//! 1. Idempotence: two calls on identical inputs give identical output
//!    (ids, field values, ordering).
//! 2. Input order does not change the output.
//! 3. Conservation: `|output| <= |A| + |B|` and every well-formed input
//!    record is represented by exactly one entity's provenance.
//! 4. No duplicate `match_id` within one output.
//! 5. Ids are stable across cycles for the same real-world match, including
//!    when a matched pair loses one of its feeds.
//! 6. Output is ordered by start time, then match id.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use serde_json::json;
use tna_reconcile::{merge, MatchingConfig};
use tna_schemas::{Inplay, Prematch, Provenance, RawRecord};

fn t(mins: i64) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2026, 10, 17, 10, 0, 0)
        .unwrap()
        + Duration::minutes(mins)
}

fn feeds() -> (Vec<RawRecord<Prematch>>, Vec<RawRecord<Inplay>>) {
    let a = vec![
        RawRecord::new("11", vec!["Alice Smith".into(), "Bob Jones".into()], Some(t(0)))
            .with_field("tournament", "Vienna")
            .with_field("status", "not_started"),
        RawRecord::new("12", vec!["Carla Diaz".into(), "Dana Lee".into()], Some(t(90))),
        RawRecord::new("13", vec!["Eve Moss".into(), "Fay Ng".into()], Some(t(180))),
        // duplicate listing of match 11 from the provider
        RawRecord::new("14", vec!["Alice Smith".into(), "Bob Jones".into()], Some(t(0))),
        RawRecord::new("15", vec!["Ghost".into()], Some(t(30))),
    ];
    let b = vec![
        RawRecord::new("900", vec!["Smith A.".into(), "Jones B.".into()], Some(t(1)))
            .with_field("status", "live")
            .with_field("score", "3-2"),
        RawRecord::new("901", vec!["Diaz C.".into(), "Lee D.".into()], Some(t(92))),
        RawRecord::new("902", vec!["Hal Ito".into(), "Ian Roy".into()], Some(t(45))),
        RawRecord::new("903", vec!["Jon Ku".into(), "Kim Wu".into()], None),
    ];
    (a, b)
}

#[test]
fn identical_inputs_identical_output() {
    let (a, b) = feeds();
    let cfg = MatchingConfig::default();
    let first = merge(&a, &b, &cfg);
    let second = merge(&a, &b, &cfg);
    assert_eq!(first, second);
}

#[test]
fn input_order_is_irrelevant() {
    let (a, b) = feeds();
    let cfg = MatchingConfig::default();
    let mut ra = a.clone();
    let mut rb = b.clone();
    ra.reverse();
    rb.reverse();
    assert_eq!(merge(&a, &b, &cfg), merge(&ra, &rb, &cfg));
}

#[test]
fn every_record_is_conserved_exactly_once() {
    let (a, b) = feeds();
    let out = merge(&a, &b, &MatchingConfig::default());

    assert!(out.entities.len() <= a.len() + b.len());
    assert_eq!(out.report.skipped.len(), 2);

    let well_formed = a.len() + b.len() - out.report.skipped.len();
    assert_eq!(out.report.represented_records(), well_formed);

    let mut seen_pre = BTreeSet::new();
    let mut seen_inp = BTreeSet::new();
    for e in &out.entities {
        match e.provenance {
            Provenance::Matched => {
                assert!(seen_pre.insert(e.sources.prematch_id.clone().unwrap()));
                assert!(seen_inp.insert(e.sources.inplay_id.clone().unwrap()));
            }
            Provenance::PrematchOnly => {
                assert!(e.sources.inplay_id.is_none());
                assert!(seen_pre.insert(e.sources.prematch_id.clone().unwrap()));
            }
            Provenance::InplayOnly => {
                assert!(e.sources.prematch_id.is_none());
                assert!(seen_inp.insert(e.sources.inplay_id.clone().unwrap()));
            }
        }
    }
    assert_eq!(seen_pre.len() + seen_inp.len(), well_formed);

    // one in-play record can serve only one of the duplicate listings
    assert_eq!(out.report.matched, 2);
    assert_eq!(out.report.prematch_only, 2);
    assert_eq!(out.report.inplay_only, 1);
}

#[test]
fn match_ids_are_unique() {
    let (a, b) = feeds();
    let out = merge(&a, &b, &MatchingConfig::default());
    let ids: BTreeSet<_> = out.entities.iter().map(|e| e.match_id).collect();
    assert_eq!(ids.len(), out.entities.len());
}

#[test]
fn ids_are_stable_when_live_feed_drifts() {
    let (a, mut b) = feeds();
    let cfg = MatchingConfig::default();
    let before = merge(&a, &b, &cfg);

    // next cycle: in-play start for match 11 moves by two minutes
    b[0].start_time = Some(t(3));
    let after = merge(&a, &b, &cfg);

    let id_of = |out: &tna_reconcile::MergeOutput| {
        out.entities
            .iter()
            .find(|e| e.sources.inplay_id.as_deref() == Some("900"))
            .map(|e| e.match_id)
            .unwrap()
    };
    assert_eq!(id_of(&before), id_of(&after));
}

#[test]
fn ids_survive_a_matched_pair_becoming_single_source() {
    let (mut a, b) = feeds();
    a.retain(|r| r.provider_id != "14");
    let cfg = MatchingConfig::default();
    let both = merge(&a, &b, &cfg);

    // 10:04 vs 10:06: inside the tolerance, in different 5-minute windows.
    let mut a_late = a.clone();
    a_late[0].start_time = Some(t(4));
    let mut b_late = b.clone();
    b_late[0].start_time = Some(t(6));
    let both_late = merge(&a_late, &b_late, &cfg);

    for (full, a, b) in [(&both, &a, &b), (&both_late, &a_late, &b_late)] {
        let matched_id = full
            .entities
            .iter()
            .find(|e| e.sources.inplay_id.as_deref() == Some("900"))
            .map(|e| e.match_id)
            .unwrap();

        // upcoming feed drops the match once it starts, or is down
        let inplay_only = merge(&[], b, &cfg);
        let e = inplay_only
            .entities
            .iter()
            .find(|e| e.sources.inplay_id.as_deref() == Some("900"))
            .unwrap();
        assert_eq!(e.provenance, Provenance::InplayOnly);
        assert_eq!(e.match_id, matched_id);

        // live feed down
        let prematch_only = merge(a, &[], &cfg);
        let e = prematch_only
            .entities
            .iter()
            .find(|e| e.sources.prematch_id.as_deref() == Some("11"))
            .unwrap();
        assert_eq!(e.provenance, Provenance::PrematchOnly);
        assert_eq!(e.match_id, matched_id);
    }
}

#[test]
fn output_is_ordered_by_start_then_id() {
    let (a, b) = feeds();
    let out = merge(&a, &b, &MatchingConfig::default());
    for pair in out.entities.windows(2) {
        let ord = (pair[0].start_time, pair[0].match_id);
        let next = (pair[1].start_time, pair[1].match_id);
        assert!(ord < next);
    }
}

#[test]
fn matched_entity_fields_are_unioned() {
    let (a, b) = feeds();
    let out = merge(&a, &b, &MatchingConfig::default());
    let e = out
        .entities
        .iter()
        .find(|e| e.sources.inplay_id.as_deref() == Some("900"))
        .unwrap();
    assert_eq!(e.fields["tournament"], json!("Vienna"));
    assert_eq!(e.fields["score"], json!("3-2"));
    assert_eq!(e.fields["status"], json!("live"));
    assert_eq!(e.superseded["status"], json!("not_started"));
}
