//! Pre-match feed adapter (BetsAPI-style `events/upcoming`).
//!
//! Native shape: `{ "success": 1, "pager": {..}, "results": [ event, .. ] }`
//! where an event carries `id`, `time` (epoch seconds, string or number),
//! `home.name`, `away.name`, `league.name`, `time_status` and optional
//! `bet365_id` / `odds`.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tna_schemas::{Prematch, RawRecord, SourceTag};
use tracing::debug;

use crate::provider::{decode_each, Source, SourceError};

/// BetsAPI sport id for tennis.
pub const TENNIS_SPORT_ID: u32 = 13;

const FEED: &str = Prematch::NAME;

/// HTTP adapter for the pre-match feed.
///
/// The API token is resolved by the caller and passed in; do not log it.
#[derive(Clone)]
pub struct PrematchHttpSource {
    token: String,
    http: reqwest::Client,
    base_url: String,
    sport_id: u32,
    max_pages: u32,
}

impl std::fmt::Debug for PrematchHttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrematchHttpSource")
            .field("token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("sport_id", &self.sport_id)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

impl PrematchHttpSource {
    pub fn new(token: String) -> Self {
        Self::new_with_base_url(token, "https://api.b365api.com".to_string())
    }

    pub fn new_with_base_url(token: String, base_url: String) -> Self {
        Self {
            token,
            http: reqwest::Client::new(),
            base_url,
            sport_id: TENNIS_SPORT_ID,
            max_pages: 5,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_sport_id(mut self, sport_id: u32) -> Self {
        self.sport_id = sport_id;
        self
    }

    /// Upper bound on pages followed per fetch (at least one).
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    fn upcoming_url(&self) -> String {
        format!("{}/v3/events/upcoming", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_page(&self, page: u32) -> Result<UpcomingResponse, SourceError> {
        let sport_id = self.sport_id.to_string();
        let page_s = page.to_string();

        let resp = self
            .http
            .get(self.upcoming_url())
            .query(&[
                ("sport_id", sport_id.as_str()),
                ("page", page_s.as_str()),
                ("token", self.token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::unavailable(FEED, format!("request failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SourceError::unavailable(
                FEED,
                format!("auth rejected status={}", status.as_u16()),
            ));
        }
        if !status.is_success() {
            return Err(SourceError::unavailable(
                FEED,
                format!("http error status={}", status.as_u16()),
            ));
        }

        let body: UpcomingResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::format(FEED, format!("response json decode failed: {e}")))?;

        if !body.is_success() {
            return Err(SourceError::unavailable(
                FEED,
                format!(
                    "provider refused request: {}",
                    body.error.as_deref().unwrap_or("unknown")
                ),
            ));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl Source for PrematchHttpSource {
    type Tag = Prematch;

    async fn fetch(&self) -> Result<Vec<RawRecord<Prematch>>, SourceError> {
        if self.token.trim().is_empty() {
            return Err(SourceError::unavailable(FEED, "api token not configured"));
        }

        let mut out: Vec<RawRecord<Prematch>> = Vec::new();
        let mut page = 1;

        loop {
            let body = self.fetch_page(page).await?;
            let results = body
                .results
                .ok_or_else(|| SourceError::format(FEED, "missing 'results' array"))?;
            out.extend(decode_each(results, to_record));

            let more = body.pager.map(|p| p.has_more()).unwrap_or(false);
            if !more || page >= self.max_pages {
                break;
            }
            page += 1;
        }

        debug!(feed = FEED, records = out.len(), pages = page, "fetched");
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Native response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct UpcomingResponse {
    #[serde(default)]
    success: Value,
    /// Decoded per event so one bad event does not fail the page.
    results: Option<Vec<Value>>,
    pager: Option<Pager>,
    error: Option<String>,
}

impl UpcomingResponse {
    fn is_success(&self) -> bool {
        match &self.success {
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => s == "1",
            Value::Bool(b) => *b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Pager {
    page: u32,
    per_page: u32,
    total: u32,
}

impl Pager {
    fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.per_page) < u64::from(self.total)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UpcomingEvent {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    time: Value,
    #[serde(default)]
    time_status: Value,
    home: Option<Named>,
    away: Option<Named>,
    league: Option<Named>,
    #[serde(default)]
    bet365_id: Value,
    #[serde(default)]
    odds: Value,
}

/// Strings and numbers both appear for ids and timestamps.
fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn epoch_to_start(v: &Value) -> Option<DateTime<FixedOffset>> {
    let secs: i64 = scalar_to_string(v)?.parse().ok()?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|t| t.fixed_offset())
}

/// `time_status` codes as documented by the provider.
fn status_label(v: &Value) -> &'static str {
    match scalar_to_string(v).as_deref() {
        Some("0") => "not_started",
        Some("1") => "inplay",
        Some("2") => "to_be_fixed",
        Some("3") => "ended",
        Some("4") => "postponed",
        Some("5") => "cancelled",
        _ => "unknown",
    }
}

fn to_record(ev: UpcomingEvent) -> RawRecord<Prematch> {
    let participants: Vec<String> = [ev.home, ev.away]
        .into_iter()
        .flatten()
        .filter_map(|n| n.name)
        .collect();

    let mut rec = RawRecord::new(
        scalar_to_string(&ev.id).unwrap_or_default(),
        participants,
        epoch_to_start(&ev.time),
    )
    .with_field("status", status_label(&ev.time_status));

    if let Some(name) = ev.league.and_then(|l| l.name) {
        rec = rec.with_field("tournament", name);
    }
    if let Some(id) = scalar_to_string(&ev.bet365_id) {
        rec = rec.with_field("bet365_id", id);
    }
    if ev.odds.is_object() {
        rec = rec.with_field("prematch_odds", ev.odds);
    }
    rec
}
