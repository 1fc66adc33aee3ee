//! In-play feed adapter (RapidAPI-hosted live tennis endpoint).
//!
//! Native shape: either a bare array of events or an object wrapping the
//! array under `events` or `results`. Each event carries `id`, `player1`,
//! `player2`, an RFC3339 `start_time` and live fields (`status`, `score`,
//! `odds`, `current_set`, `server`).

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use tna_schemas::{Inplay, RawRecord, SourceTag};
use tracing::debug;

use crate::provider::{decode_each, Source, SourceError};

const FEED: &str = Inplay::NAME;

#[derive(Clone)]
pub struct InplayHttpSource {
    api_key: String,
    api_host: String,
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for InplayHttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InplayHttpSource")
            .field("api_key", &"<REDACTED>")
            .field("api_host", &self.api_host)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl InplayHttpSource {
    pub fn new(api_key: String, api_host: String) -> Self {
        let base_url = format!("https://{api_host}");
        Self::new_with_base_url(api_key, api_host, base_url)
    }

    pub fn new_with_base_url(api_key: String, api_host: String, base_url: String) -> Self {
        Self {
            api_key,
            api_host,
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn inplay_url(&self) -> String {
        format!("{}/inplay", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Source for InplayHttpSource {
    type Tag = Inplay;

    async fn fetch(&self) -> Result<Vec<RawRecord<Inplay>>, SourceError> {
        if self.api_key.trim().is_empty() {
            return Err(SourceError::unavailable(FEED, "api key not configured"));
        }

        let resp = self
            .http
            .get(self.inplay_url())
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .send()
            .await
            .map_err(|e| SourceError::unavailable(FEED, format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::unavailable(
                FEED,
                format!("http error status={}", status.as_u16()),
            ));
        }

        let body: InplayResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::format(FEED, format!("response json decode failed: {e}")))?;

        let events = body.into_events()?;
        let out = decode_each(events, to_record);

        debug!(feed = FEED, records = out.len(), "fetched");
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Native response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum InplayResponse {
    List(Vec<Value>),
    Wrapped {
        events: Option<Vec<Value>>,
        results: Option<Vec<Value>>,
    },
}

impl InplayResponse {
    fn into_events(self) -> Result<Vec<Value>, SourceError> {
        match self {
            InplayResponse::List(v) => Ok(v),
            InplayResponse::Wrapped { events, results } => events
                .or(results)
                .ok_or_else(|| SourceError::format(FEED, "missing 'events' or 'results' array")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct InplayEvent {
    #[serde(default)]
    id: Value,
    player1: Option<String>,
    player2: Option<String>,
    start_time: Option<String>,
    status: Option<String>,
    score: Option<String>,
    tournament: Option<String>,
    odds: Option<InplayOdds>,
    #[serde(default)]
    current_set: Value,
    server: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct InplayOdds {
    #[serde(default)]
    player1: Value,
    #[serde(default)]
    player2: Value,
}

fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn parse_start(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim()).ok()
}

fn to_record(ev: InplayEvent) -> RawRecord<Inplay> {
    let participants: Vec<String> = [ev.player1, ev.player2].into_iter().flatten().collect();
    let start = ev.start_time.as_deref().and_then(parse_start);

    let mut rec = RawRecord::new(id_string(&ev.id), participants, start);

    if let Some(status) = ev.status {
        rec = rec.with_field("status", status);
    }
    if let Some(score) = ev.score {
        rec = rec.with_field("score", score);
    }
    if let Some(tournament) = ev.tournament {
        rec = rec.with_field("tournament", tournament);
    }
    if let Some(odds) = ev.odds {
        rec = rec.with_field(
            "live_odds",
            serde_json::json!({ "player1": odds.player1, "player2": odds.player2 }),
        );
    }
    if !ev.current_set.is_null() {
        rec = rec.with_field("current_set", ev.current_set);
    }
    if let Some(server) = ev.server {
        rec = rec.with_field("server", server);
    }
    rec
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_array_and_wrapped_shapes_decode() {
        let ev = json!({ "id": 1, "player1": "Smith A.", "player2": "Jones B." });

        let bare: InplayResponse = serde_json::from_value(json!([ev.clone()])).unwrap();
        assert_eq!(bare.into_events().unwrap().len(), 1);

        let wrapped: InplayResponse = serde_json::from_value(json!({ "events": [ev.clone()] })).unwrap();
        assert_eq!(wrapped.into_events().unwrap().len(), 1);

        let results: InplayResponse = serde_json::from_value(json!({ "results": [ev] })).unwrap();
        assert_eq!(results.into_events().unwrap().len(), 1);
    }

    #[test]
    fn object_without_event_list_is_format_error() {
        let resp: InplayResponse = serde_json::from_value(json!({ "message": "ok" })).unwrap();
        let err = resp.into_events().unwrap_err();
        assert_eq!(err.kind(), "source_format_error");
    }

    #[test]
    fn maps_live_fields() {
        let ev: InplayEvent = serde_json::from_value(json!({
            "id": "b-77",
            "player1": "Smith A.",
            "player2": "Jones B.",
            "start_time": "2026-10-17T16:01:00+02:00",
            "status": "live",
            "score": "6-4 2-1",
            "odds": { "player1": 1.45, "player2": 2.7 },
            "current_set": 2,
            "server": "player1"
        }))
        .unwrap();
        let rec = to_record(ev);

        assert_eq!(rec.provider_id, "b-77");
        assert_eq!(rec.participants, vec!["Smith A.", "Jones B."]);
        assert_eq!(rec.start_time.unwrap().timestamp(), 1_792_245_660);
        assert_eq!(rec.fields["status"], "live");
        assert_eq!(rec.fields["live_odds"]["player2"], 2.7);
        assert_eq!(rec.fields["current_set"], 2);
        assert_eq!(rec.fields["server"], "player1");
    }

    #[test]
    fn bad_start_time_is_none() {
        let ev: InplayEvent =
            serde_json::from_value(json!({ "id": 5, "start_time": "17/10/2026 14:00" })).unwrap();
        assert!(to_record(ev).start_time.is_none());
    }
}
