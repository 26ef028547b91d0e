//! pmr-config
//!
//! Layered YAML configuration for reconciliation passes.
//!
//! - later documents override earlier ones (deep merge of mappings)
//! - the merged document is hashed (SHA-256 of canonical JSON) so every pass
//!   can record exactly which configuration it ran with
//! - literal secrets are rejected; YAML names env vars, never values
//! - leaves no code reads are reported (or rejected) as unused
//!
//! Typed sections live in [`settings`]; env-var resolution in [`secrets`].

mod guard;
pub mod secrets;
pub mod settings;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub use guard::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport, CONSUMED_POINTERS};
pub use secrets::{resolve_session_secrets, ResolvedSession};
pub use settings::{
    parse_settings, AuditSettings, FeedLocation, LedgerSettings, PmrSettings, ReconcileSection,
    SessionEnvNames, SourceSpec,
};

/// A merged config document and its identity.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Hex SHA-256 of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Read and merge YAML files, first to last.
pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let layers = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {}", p.display()))
        })
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = layers.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (layer, raw) in yaml_docs.iter().enumerate() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml (layer {layer})"))?;
        let doc = serde_json::to_value(doc)
            .with_context(|| format!("yaml layer {layer} is not representable as json"))?;
        // An empty document parses as null; it overrides nothing.
        if !doc.is_null() {
            overlay(&mut merged, doc);
        }
    }

    guard::reject_secret_literals(&merged)?;

    // serde_json's default map keeps keys sorted, so compact output is canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Mappings merge key by key; scalars and sequences in `top` replace `base`.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(base_map), Value::Object(top_map)) => {
            for (key, top_val) in top_map {
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, top_val),
                    None => {
                        base_map.insert(key, top_val);
                    }
                }
            }
        }
        (slot, top) => *slot = top,
    }
}
