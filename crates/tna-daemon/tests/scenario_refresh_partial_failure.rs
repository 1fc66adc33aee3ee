//! One feed down: the survivor is merged alone and the snapshot says so.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone};
use tna_daemon::refresh::{LoopSettings, RefreshLoop};
use tna_daemon::state::{AppState, BusMsg};
use tna_schemas::{Inplay, Prematch, Provenance, RawRecord};
use tna_sources::testkit::{FailingSource, StaticSource};
use tna_sources::SourceError;

fn t(h: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2026, 10, 17, h, 0, 0)
        .unwrap()
}

fn inplay_three() -> Vec<RawRecord<Inplay>> {
    vec![
        RawRecord::new("1", vec!["Smith A.".into(), "Jones B.".into()], Some(t(12))),
        RawRecord::new("2", vec!["Diaz C.".into(), "White D.".into()], Some(t(13))),
        RawRecord::new("3", vec!["Novak E.".into(), "Berg F.".into()], Some(t(14))),
    ]
}

#[tokio::test]
async fn prematch_down_publishes_three_inplay_only_entities() {
    let st = Arc::new(AppState::new());
    let mut bus = st.bus.subscribe();
    let refresh = RefreshLoop::new(
        Arc::new(FailingSource::<Prematch>::unavailable()),
        Arc::new(StaticSource::new(inplay_three())),
        LoopSettings::default(),
        Arc::clone(&st),
    );

    let report = refresh.run_cycle().await.expect("degraded cycle still publishes");
    assert_eq!(report.matches, 3);
    assert_eq!(report.inplay_only, 3);
    assert_eq!(report.degraded, vec!["prematch"]);

    let snap = st.store.current();
    assert_eq!(snap.version, 1);
    assert_eq!(snap.degraded, vec!["prematch".to_string()]);
    assert!(snap
        .matches
        .iter()
        .all(|m| m.provenance == Provenance::InplayOnly));

    match bus.recv().await.unwrap() {
        BusMsg::SnapshotPublished { version, degraded, .. } => {
            assert_eq!(version, 1);
            assert_eq!(degraded, vec!["prematch".to_string()]);
        }
        other => panic!("unexpected bus message: {other:?}"),
    }
}

#[tokio::test]
async fn inplay_format_error_degrades_the_other_way() {
    let st = Arc::new(AppState::new());
    let prematch = StaticSource::<Prematch>::new(vec![RawRecord::new(
        "p1",
        vec!["Alice Smith".into(), "Bob Jones".into()],
        Some(t(12)),
    )]);
    let refresh = RefreshLoop::new(
        Arc::new(prematch),
        Arc::new(FailingSource::<Inplay>::new(SourceError::format(
            "inplay",
            "missing 'events' or 'results' array",
        ))),
        LoopSettings::default(),
        Arc::clone(&st),
    );

    let report = refresh.run_cycle().await.unwrap();
    assert_eq!(report.prematch_only, 1);
    assert_eq!(report.degraded, vec!["inplay"]);
    assert_eq!(st.store.current().matches[0].provenance, Provenance::PrematchOnly);
}

#[tokio::test]
async fn malformed_records_are_counted_in_the_snapshot() {
    let st = Arc::new(AppState::new());
    let mut records = inplay_three();
    records.push(RawRecord::new("4", vec!["Lonely Player".into()], Some(t(15))));

    let refresh = RefreshLoop::new(
        Arc::new(StaticSource::<Prematch>::new(Vec::new())),
        Arc::new(StaticSource::new(records)),
        LoopSettings::default(),
        Arc::clone(&st),
    );
    let report = refresh.run_cycle().await.unwrap();

    assert_eq!(report.skipped_records, 1);
    assert_eq!(st.store.current().skipped_records, 1);
    assert_eq!(st.store.current().matches.len(), 3);
    assert!(st.store.current().degraded.is_empty());
}
