use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tna_schemas::{
    FieldMap, Inplay, MatchEntity, Prematch, Provenance, RawRecord, SourceIds, SourceTag,
};
use uuid::Uuid;

use crate::key::MatchKey;
use crate::normalize::{canonical_time, participant_set};
use crate::precedence::merge_fields;
use crate::{MalformedReason, MatchingConfig, MergeOutput, MergeReport, RecordMalformed};

/// A record that survived validation, with its derived identity.
struct Prepared<'a, S> {
    record: &'a RawRecord<S>,
    participants: Vec<String>,
    start: DateTime<Utc>,
}

/// Numeric ids compare numerically, anything else lexically.
fn cmp_provider_id(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn prepare<'a, S: SourceTag>(
    records: &'a [RawRecord<S>],
    skipped: &mut Vec<RecordMalformed>,
) -> Vec<Prepared<'a, S>> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let Some(participants) = participant_set(&record.participants) else {
            skipped.push(RecordMalformed {
                source: S::NAME,
                provider_id: record.provider_id.clone(),
                reason: MalformedReason::MissingParticipants,
            });
            continue;
        };
        let Some(start) = record.start_time.as_ref().map(canonical_time) else {
            skipped.push(RecordMalformed {
                source: S::NAME,
                provider_id: record.provider_id.clone(),
                reason: MalformedReason::MissingStartTime,
            });
            continue;
        };
        out.push(Prepared {
            record,
            participants,
            start,
        });
    }

    // Visit order must not depend on feed order.
    out.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| cmp_provider_id(&a.record.provider_id, &b.record.provider_id))
            .then_with(|| a.participants.cmp(&b.participants))
    });
    out
}

/// Hands out match ids, guaranteeing uniqueness within one merge.
///
/// Entities sharing a key (same players, same UTC day) are numbered in start
/// order; the first takes the key's base id. The number never depends on
/// which feed supplied the entity, so an id survives a matched pair becoming
/// single-source.
#[derive(Default)]
struct IdAllocator {
    used: BTreeSet<Uuid>,
    per_key: BTreeMap<MatchKey, usize>,
}

impl IdAllocator {
    fn allocate(&mut self, key: &MatchKey) -> Uuid {
        let ordinal = self.per_key.entry(key.clone()).or_insert(0);
        loop {
            let id = key.nth_id(*ordinal);
            *ordinal += 1;
            if self.used.insert(id) {
                return id;
            }
        }
    }
}

/// An entity whose id is assigned once every entity is known.
struct Pending {
    key: MatchKey,
    entity: MatchEntity,
}

fn assign_ids(mut pending: Vec<Pending>) -> Vec<MatchEntity> {
    pending.sort_by(|x, y| {
        x.key
            .cmp(&y.key)
            .then_with(|| x.entity.start_time.cmp(&y.entity.start_time))
            .then_with(|| cmp_source_ids(&x.entity.sources, &y.entity.sources))
    });
    let mut ids = IdAllocator::default();
    pending
        .into_iter()
        .map(|mut p| {
            p.entity.match_id = ids.allocate(&p.key);
            p.entity
        })
        .collect()
}

fn cmp_source_ids(a: &SourceIds, b: &SourceIds) -> Ordering {
    let opt = |x: &Option<String>, y: &Option<String>| match (x, y) {
        (Some(x), Some(y)) => cmp_provider_id(x, y),
        (x, y) => x.is_some().cmp(&y.is_some()),
    };
    opt(&a.prematch_id, &b.prematch_id).then_with(|| opt(&a.inplay_id, &b.inplay_id))
}

fn display_names(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

fn single_entity<S: SourceTag>(p: &Prepared<'_, S>) -> Pending {
    let key = MatchKey::new(p.participants.clone(), p.start);
    let provenance = S::SINGLE_PROVENANCE;
    let mut sources = SourceIds::default();
    match provenance {
        Provenance::InplayOnly => sources.inplay_id = Some(p.record.provider_id.clone()),
        _ => sources.prematch_id = Some(p.record.provider_id.clone()),
    }

    let entity = MatchEntity {
        match_id: Uuid::nil(),
        participants: display_names(&p.record.participants),
        participant_keys: p.participants.clone(),
        start_time: p.start,
        provenance,
        sources,
        fields: p.record.fields.clone(),
        superseded: FieldMap::new(),
    };
    Pending { key, entity }
}

fn matched_entity(a: &Prepared<'_, Prematch>, b: &Prepared<'_, Inplay>) -> Pending {
    let key = MatchKey::new(a.participants.clone(), a.start);
    let merged = merge_fields(&a.record.fields, &b.record.fields);

    let entity = MatchEntity {
        match_id: Uuid::nil(),
        participants: display_names(&a.record.participants),
        participant_keys: a.participants.clone(),
        start_time: a.start,
        provenance: Provenance::Matched,
        sources: SourceIds {
            prematch_id: Some(a.record.provider_id.clone()),
            inplay_id: Some(b.record.provider_id.clone()),
        },
        fields: merged.fields,
        superseded: merged.superseded,
    };
    Pending { key, entity }
}

/// Reconcile the pre-match and in-play feeds into unified entities.
///
/// - Malformed records (fewer than two participants, no start time) are
///   skipped and listed in the report; they never abort the merge.
/// - Pairing is greedy and one-to-one: each pre-match record (in start-time
///   order) takes the closest unconsumed in-play record with the same
///   participant set within the tolerance, lowest provider id on ties.
/// - Every well-formed input appears in exactly one entity; ids are unique.
/// - Output is ordered by start time, then match id.
pub fn merge(
    prematch: &[RawRecord<Prematch>],
    inplay: &[RawRecord<Inplay>],
    cfg: &MatchingConfig,
) -> MergeOutput {
    let tolerance = cfg.tolerance_secs();
    let mut report = MergeReport::default();

    let a = prepare(prematch, &mut report.skipped);
    let b = prepare(inplay, &mut report.skipped);

    let mut index: BTreeMap<&[String], Vec<usize>> = BTreeMap::new();
    for (i, p) in b.iter().enumerate() {
        index.entry(p.participants.as_slice()).or_default().push(i);
    }

    let mut consumed = vec![false; b.len()];
    let mut pending = Vec::with_capacity(a.len() + b.len());

    for pa in &a {
        let best = index.get(pa.participants.as_slice()).and_then(|candidates| {
            candidates
                .iter()
                .copied()
                .filter(|&i| !consumed[i])
                .filter_map(|i| {
                    let delta = (b[i].start - pa.start).num_seconds().abs();
                    (delta <= tolerance).then_some((delta, i))
                })
                .min_by(|x, y| {
                    x.0.cmp(&y.0).then_with(|| {
                        cmp_provider_id(&b[x.1].record.provider_id, &b[y.1].record.provider_id)
                    })
                })
        });

        match best {
            Some((_, i)) => {
                consumed[i] = true;
                pending.push(matched_entity(pa, &b[i]));
                report.matched += 1;
            }
            None => {
                pending.push(single_entity(pa));
                report.prematch_only += 1;
            }
        }
    }

    for (i, pb) in b.iter().enumerate() {
        if !consumed[i] {
            pending.push(single_entity(pb));
            report.inplay_only += 1;
        }
    }

    let mut entities = assign_ids(pending);
    entities.sort_by(|x, y| {
        x.start_time
            .cmp(&y.start_time)
            .then_with(|| x.match_id.cmp(&y.match_id))
    });
    report.skipped.sort();

    MergeOutput { entities, report }
}
