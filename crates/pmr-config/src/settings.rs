//! Typed views over the merged config document.
//!
//! ```yaml
//! reconcile:
//!   platform: LinkedIn
//!   winner_multiplier: 2.0
//!   fallback_threshold: 10
//!   inter_operation_delay_ms: 1500
//!   max_records_per_pass: 50
//! ledger:
//!   dir: ./ledger
//! audit:
//!   path: ./audit/reconcile.jsonl
//!   hash_chain: true
//! sources:
//!   - kind: official
//!     feed: { url: "https://api.example.test/rest/shares" }
//!     session_env: { token: PMR_OFFICIAL_TOKEN }
//!     required: true
//!   - kind: scrape
//!     feed: { file: ./captures/feed.json }
//! ```
//!
//! Every section is optional and falls back to defaults; an empty source
//! list is valid here and rejected later, when a pass needs metrics.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SOURCE_KINDS: &[&str] = &["scrape", "internal", "official"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileSection {
    /// Tab prefix: `{platform}Posted`, `{platform}Winners`.
    pub platform: String,
    pub winner_multiplier: f64,
    pub fallback_threshold: u64,
    pub inter_operation_delay_ms: u64,
    pub max_records_per_pass: usize,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            platform: "LinkedIn".to_string(),
            winner_multiplier: 2.0,
            fallback_threshold: 10,
            inter_operation_delay_ms: 1500,
            max_records_per_pass: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerSettings {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSettings {
    /// No path: no audit trail.
    pub path: Option<PathBuf>,
    pub hash_chain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    File(PathBuf),
    Url(String),
}

/// Names of the env vars holding session state. Names only, never values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionEnvNames {
    pub token: Option<String>,
    pub cookie: Option<String>,
    /// Header name -> env var name.
    pub headers: BTreeMap<String, String>,
}

impl SessionEnvNames {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.cookie.is_none() && self.headers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// One of [`SOURCE_KINDS`], lower-cased.
    pub kind: String,
    pub feed: FeedLocation,
    pub session_env: SessionEnvNames,
    /// A required source with unset session variables is a config error.
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmrSettings {
    pub reconcile: ReconcileSection,
    pub ledger: LedgerSettings,
    pub audit: AuditSettings,
    pub sources: Vec<SourceSpec>,
}

// ---------------------------------------------------------------------------
// Raw shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSource {
    kind: String,
    #[serde(default)]
    feed: RawFeed,
    #[serde(default)]
    session_env: SessionEnvNames,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeed {
    file: Option<PathBuf>,
    url: Option<String>,
}

fn section<T: Default + serde::de::DeserializeOwned>(config: &Value, pointer: &str) -> Result<T> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v.clone())
            .with_context(|| format!("CONFIG_INVALID at {pointer}")),
    }
}

fn source_spec(i: usize, raw: RawSource) -> Result<SourceSpec> {
    let kind = raw.kind.trim().to_ascii_lowercase();
    if !SOURCE_KINDS.contains(&kind.as_str()) {
        bail!(
            "CONFIG_INVALID at /sources/{i}/kind: '{}' (expected one of: {})",
            raw.kind,
            SOURCE_KINDS.join(" | ")
        );
    }

    let feed = match (raw.feed.file, raw.feed.url) {
        (Some(file), None) => FeedLocation::File(file),
        (None, Some(url)) => {
            let url = url.trim().to_string();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("CONFIG_INVALID at /sources/{i}/feed/url: must be http(s)");
            }
            FeedLocation::Url(url)
        }
        (Some(_), Some(_)) => {
            bail!("CONFIG_INVALID at /sources/{i}/feed: set exactly one of file | url")
        }
        (None, None) => bail!("CONFIG_INVALID at /sources/{i}/feed: missing file | url"),
    };

    Ok(SourceSpec {
        kind,
        feed,
        session_env: raw.session_env,
        required: raw.required,
    })
}

/// Extract every typed section from a loaded config document.
pub fn parse_settings(config: &Value) -> Result<PmrSettings> {
    let reconcile: ReconcileSection = section(config, "/reconcile")?;
    if reconcile.platform.trim().is_empty() {
        bail!("CONFIG_INVALID at /reconcile/platform: must not be blank");
    }
    if !(reconcile.winner_multiplier.is_finite() && reconcile.winner_multiplier > 0.0) {
        bail!("CONFIG_INVALID at /reconcile/winner_multiplier: must be > 0");
    }
    if reconcile.max_records_per_pass == 0 {
        bail!("CONFIG_INVALID at /reconcile/max_records_per_pass: must be >= 1");
    }

    let ledger: LedgerSettings = section(config, "/ledger")?;
    let audit: AuditSettings = section(config, "/audit")?;

    let raw_sources: Vec<RawSource> = section(config, "/sources")?;
    let sources = raw_sources
        .into_iter()
        .enumerate()
        .map(|(i, raw)| source_spec(i, raw))
        .collect::<Result<Vec<_>>>()?;

    Ok(PmrSettings {
        reconcile,
        ledger,
        audit,
        sources,
    })
}
