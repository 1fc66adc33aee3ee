//! Typed view of the merged configuration.
//!
//! Every section and key has a default, so an empty document is a valid
//! configuration. `from_json` validates cross-field constraints after decode.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub refresh: RefreshSettings,
    pub matching: MatchingSettings,
    pub sources: SourcesSettings,
    pub daemon: DaemonSettings,
}

impl AggregatorConfig {
    /// Decode from the merged config JSON and validate.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: AggregatorConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: failed to decode aggregator config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.refresh;
        if r.interval_secs == 0 {
            bail!("CONFIG_INVALID: refresh.interval_secs must be > 0");
        }
        if r.backoff_secs == 0 {
            bail!("CONFIG_INVALID: refresh.backoff_secs must be > 0");
        }
        if r.backoff_secs > r.interval_secs {
            bail!(
                "CONFIG_INVALID: refresh.backoff_secs ({}) must not exceed refresh.interval_secs ({})",
                r.backoff_secs,
                r.interval_secs
            );
        }
        if r.fetch_timeout_secs == 0 {
            bail!("CONFIG_INVALID: refresh.fetch_timeout_secs must be > 0");
        }
        if self.matching.time_tolerance_secs == 0 {
            bail!("CONFIG_INVALID: matching.time_tolerance_secs must be > 0");
        }
        if self.sources.prematch.max_pages == 0 {
            bail!("CONFIG_INVALID: sources.prematch.max_pages must be >= 1");
        }
        self.daemon.socket_addr()?;
        self.daemon.validate_origins()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Cooldown after a published snapshot.
    pub interval_secs: u64,
    /// Cooldown after an aborted cycle.
    pub backoff_secs: u64,
    /// Upper bound on one adapter fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            backoff_secs: 10,
            fetch_timeout_secs: 20,
        }
    }
}

impl RefreshSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub time_tolerance_secs: u64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            time_tolerance_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesSettings {
    pub prematch: PrematchSettings,
    pub inplay: InplaySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrematchSettings {
    pub base_url: String,
    pub sport_id: u32,
    pub max_pages: u32,
    pub keys_env: PrematchKeysEnv,
}

impl Default for PrematchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.b365api.com".to_string(),
            sport_id: 13,
            max_pages: 5,
            keys_env: PrematchKeysEnv::default(),
        }
    }
}

/// Env var NAMES, never values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrematchKeysEnv {
    pub api_token: String,
}

impl Default for PrematchKeysEnv {
    fn default() -> Self {
        Self {
            api_token: "BETSAPI_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InplaySettings {
    pub base_url: String,
    pub api_host: String,
    pub keys_env: InplayKeysEnv,
}

impl Default for InplaySettings {
    fn default() -> Self {
        Self {
            base_url: "https://tennis-live-data.p.rapidapi.com".to_string(),
            api_host: "tennis-live-data.p.rapidapi.com".to_string(),
            keys_env: InplayKeysEnv::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InplayKeysEnv {
    pub api_key: String,
}

impl Default for InplayKeysEnv {
    fn default() -> Self {
        Self {
            api_key: "RAPIDAPI_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub addr: String,
    /// Browser origins allowed to read the API. `"*"` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            cors_origins: [
                "http://localhost",
                "http://127.0.0.1",
                "http://localhost:3000",
                "http://127.0.0.1:3000",
                "http://localhost:5173",
                "http://127.0.0.1:5173",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl DaemonSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr
            .parse()
            .with_context(|| format!("CONFIG_INVALID: daemon.addr '{}' is not host:port", self.addr))
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o.trim() == "*")
    }

    fn validate_origins(&self) -> Result<()> {
        for origin in &self.cors_origins {
            let o = origin.trim();
            let scheme_ok = o.starts_with("http://") || o.starts_with("https://");
            if o != "*" && (!scheme_ok || o.ends_with('/')) {
                bail!(
                    "CONFIG_INVALID: daemon.cors_origins entry '{origin}' must be \"*\" or scheme://host[:port]"
                );
            }
        }
        Ok(())
    }
}
