//! Runtime secret resolution.
//!
//! Config YAML stores env var NAMES under `sources.<feed>.keys_env`. The
//! daemon calls [`resolve_source_secrets`] once at startup and hands the
//! values to the adapter constructors. `Debug` redacts values and errors
//! mention the variable NAME only.

use anyhow::{bail, Result};

use crate::settings::AggregatorConfig;

/// What to do when a feed's credential is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsPolicy {
    /// Missing credentials leave that feed unconfigured; its adapter reports
    /// `Unavailable` every cycle and the daemon serves a degraded snapshot.
    AllowPartial,
    /// Every feed credential must be present.
    RequireAll,
}

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Pre-match provider token. `None` if the named env var is unset or blank.
    pub prematch_api_token: Option<String>,
    /// In-play provider key. `None` if the named env var is unset or blank.
    pub inplay_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "prematch_api_token",
                &self.prematch_api_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "inplay_api_key",
                &self.inplay_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl ResolvedSecrets {
    /// Names of feeds with no credential, in feed order.
    pub fn missing_feeds(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.prematch_api_token.is_none() {
            out.push("prematch");
        }
        if self.inplay_api_key.is_none() {
            out.push("inplay");
        }
        out
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    let name = var_name.trim();
    if name.is_empty() {
        return None;
    }
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve feed credentials from the environment.
///
/// # Errors
/// Under [`SecretsPolicy::RequireAll`], the first missing credential fails
/// with `SECRETS_MISSING` naming the env var.
pub fn resolve_source_secrets(cfg: &AggregatorConfig, policy: SecretsPolicy) -> Result<ResolvedSecrets> {
    let token_var = &cfg.sources.prematch.keys_env.api_token;
    let key_var = &cfg.sources.inplay.keys_env.api_key;

    let resolved = ResolvedSecrets {
        prematch_api_token: resolve_env(token_var),
        inplay_api_key: resolve_env(key_var),
    };

    if policy == SecretsPolicy::RequireAll {
        if resolved.prematch_api_token.is_none() {
            bail!(
                "SECRETS_MISSING: required env var '{}' (prematch api_token) is not set or empty",
                token_var
            );
        }
        if resolved.inplay_api_key.is_none() {
            bail!(
                "SECRETS_MISSING: required env var '{}' (inplay api_key) is not set or empty",
                key_var
            );
        }
    }

    Ok(resolved)
}
