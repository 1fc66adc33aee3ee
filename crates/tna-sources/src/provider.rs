//! Adapter boundary for the upstream feeds.
//!
//! This module defines the adapter trait, its error type, the timeout
//! wrapper and the per-event decoding shared by the HTTP adapters in
//! `prematch.rs` and `inplay.rs`.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tna_schemas::{RawRecord, SourceTag};
use tracing::warn;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`Source`] may return. Both are recoverable: the refresh loop
/// skips the failed feed for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network, auth, HTTP status, provider refusal or timeout.
    Unavailable { feed: &'static str, message: String },
    /// The response arrived but its shape was not what the adapter expects.
    Format { feed: &'static str, message: String },
}

impl SourceError {
    pub fn unavailable(feed: &'static str, message: impl Into<String>) -> Self {
        SourceError::Unavailable {
            feed,
            message: message.into(),
        }
    }

    pub fn format(feed: &'static str, message: impl Into<String>) -> Self {
        SourceError::Format {
            feed,
            message: message.into(),
        }
    }

    pub fn feed(&self) -> &'static str {
        match self {
            SourceError::Unavailable { feed, .. } | SourceError::Format { feed, .. } => feed,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Unavailable { .. } => "source_unavailable",
            SourceError::Format { .. } => "source_format_error",
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable { feed, message } => {
                write!(f, "{feed} unavailable: {message}")
            }
            SourceError::Format { feed, message } => {
                write!(f, "{feed} format error: {message}")
            }
        }
    }
}

impl std::error::Error for SourceError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Upstream feed contract.
///
/// Object safe, so the refresh loop holds `Arc<dyn Source<Tag = Prematch>>`
/// and tests substitute canned doubles. Implementations keep no mutable state
/// between calls.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    type Tag: SourceTag;

    fn name(&self) -> &'static str {
        <Self::Tag as SourceTag>::NAME
    }

    /// Fetch the feed's current match list in provider order.
    async fn fetch(&self) -> Result<Vec<RawRecord<Self::Tag>>, SourceError>;
}

/// Run one fetch bounded by `timeout`. Exceeding it is `Unavailable`.
pub async fn fetch_with_timeout<S>(
    source: &S,
    timeout: Duration,
) -> Result<Vec<RawRecord<S::Tag>>, SourceError>
where
    S: Source + ?Sized,
{
    match tokio::time::timeout(timeout, source.fetch()).await {
        Ok(res) => res,
        Err(_) => Err(SourceError::unavailable(
            source.name(),
            format!("fetch timed out after {}ms", timeout.as_millis()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Per-event decoding
// ---------------------------------------------------------------------------

/// Decode each event of an already-validated envelope on its own.
///
/// An event that does not fit `E` becomes a record with no participants and
/// no start time, which the merge reports as malformed. The rest of the feed
/// is unaffected.
pub(crate) fn decode_each<E, S>(
    events: Vec<Value>,
    to_record: fn(E) -> RawRecord<S>,
) -> Vec<RawRecord<S>>
where
    E: DeserializeOwned,
    S: SourceTag,
{
    events
        .into_iter()
        .map(|raw| match E::deserialize(&raw) {
            Ok(ev) => to_record(ev),
            Err(err) => undecodable::<S>(&raw, &err),
        })
        .collect()
}

fn undecodable<S: SourceTag>(raw: &Value, err: &serde_json::Error) -> RawRecord<S> {
    let provider_id = match raw.get("id") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    warn!(feed = S::NAME, provider_id = %provider_id, error = %err, "event not decodable");
    RawRecord::new(provider_id, Vec::new(), None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{FailingSource, SlowSource, StaticSource};
    use std::sync::Arc;
    use tna_schemas::{Inplay, Prematch};

    fn rec(id: &str) -> RawRecord<Prematch> {
        RawRecord::new(id, vec!["A B".into(), "C D".into()], None)
    }

    #[tokio::test]
    async fn static_source_is_object_safe_and_returns_records() {
        let src: Arc<dyn Source<Tag = Prematch>> =
            Arc::new(StaticSource::new(vec![rec("1"), rec("2")]));
        assert_eq!(src.name(), "prematch");
        let out = src.fetch().await.unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_maps_to_unavailable() {
        let slow: SlowSource<Inplay> = SlowSource::new(Duration::from_secs(30), Vec::new());
        let err = fetch_with_timeout(&slow, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "source_unavailable");
        assert_eq!(err.feed(), "inplay");
        assert!(err.to_string().contains("timed out"));
    }

    #[derive(serde::Deserialize)]
    struct Ev {
        id: u64,
        name: String,
    }

    fn ev_record(ev: Ev) -> RawRecord<Prematch> {
        RawRecord::new(ev.id.to_string(), vec![ev.name, "Other".into()], None)
    }

    #[test]
    fn one_bad_event_does_not_spoil_the_rest() {
        let events = vec![
            serde_json::json!({ "id": 1, "name": "Alice" }),
            serde_json::json!({ "id": 2, "name": { "first": "Bob" } }),
            serde_json::json!("garbage"),
        ];
        let out = decode_each(events, ev_record);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].participants, vec!["Alice", "Other"]);
        assert_eq!(out[1].provider_id, "2");
        assert!(out[1].participants.is_empty());
        assert!(out[1].start_time.is_none());
        assert_eq!(out[2].provider_id, "");
    }

    #[tokio::test]
    async fn errors_pass_through_unchanged() {
        let failing: FailingSource<Prematch> =
            FailingSource::new(SourceError::format("prematch", "results is not an array"));
        let err = fetch_with_timeout(&failing, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "prematch format error: results is not an array"
        );
    }
}
