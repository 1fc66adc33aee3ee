//! Scenario: conflicting fields resolve through the precedence table.
//!
//! # Invariants under test
//!
//! 1. Both feeds report `status` with different values: the in-play value
//!    wins and the pre-match value is kept under `superseded`.
//! 2. The result does not depend on which feed is iterated first
//!    (swapping record order in each feed changes nothing).
//! 3. A pre-match-owned field (`tournament`) keeps the pre-match value.

use chrono::{FixedOffset, TimeZone};
use serde_json::json;
use tna_reconcile::precedence::{precedence_for, Precedence};
use tna_reconcile::{merge, MatchingConfig};
use tna_schemas::{Inplay, Prematch, RawRecord};

fn start() -> chrono::DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2026, 10, 17, 15, 0, 0)
        .unwrap()
}

fn pair() -> (RawRecord<Prematch>, RawRecord<Inplay>) {
    let a = RawRecord::new("5", vec!["Alice Smith".into(), "Bob Jones".into()], Some(start()))
        .with_field("status", "not_started")
        .with_field("tournament", "Erste Bank Open");
    let b = RawRecord::new("6", vec!["Smith A.".into(), "Jones B.".into()], Some(start()))
        .with_field("status", "in_progress")
        .with_field("tournament", "ATP 500 Vienna");
    (a, b)
}

#[test]
fn status_collision_resolves_to_inplay() {
    assert_eq!(precedence_for("status"), Precedence::Inplay);

    let (a, b) = pair();
    let out = merge(&[a], &[b], &MatchingConfig::default());
    let e = &out.entities[0];

    assert_eq!(e.fields["status"], json!("in_progress"));
    assert_eq!(e.superseded["status"], json!("not_started"));
}

#[test]
fn tournament_collision_resolves_to_prematch() {
    let (a, b) = pair();
    let out = merge(&[a], &[b], &MatchingConfig::default());
    let e = &out.entities[0];

    assert_eq!(e.fields["tournament"], json!("Erste Bank Open"));
    assert_eq!(e.superseded["tournament"], json!("ATP 500 Vienna"));
}

#[test]
fn iteration_order_does_not_matter() {
    let (a, b) = pair();
    let filler_a = RawRecord::new("1", vec!["Eve Moss".into(), "Fay Ng".into()], Some(start()));
    let filler_b = RawRecord::new("2", vec!["Hal Ito".into(), "Ian Roy".into()], Some(start()));

    let cfg = MatchingConfig::default();
    let one = merge(
        &[a.clone(), filler_a.clone()],
        &[b.clone(), filler_b.clone()],
        &cfg,
    );
    let two = merge(&[filler_a, a], &[filler_b, b], &cfg);
    assert_eq!(one, two);
}
