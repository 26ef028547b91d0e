//! Checks over the merged document: literal secrets and unused keys.
//!
//! Both walk the same flattened view: every leaf (scalar, or empty
//! container) as an RFC 6901 pointer.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Leading text of values that are credentials, never env var names.
const SECRET_PREFIXES: &[(&str, &str)] = &[
    ("sk-", "api key"),
    ("sk_live", "live api key"),
    ("sk_test", "test api key"),
    ("AKIA", "aws access key"),
    ("-----BEGIN", "pem block"),
    ("ghp_", "github token"),
    ("glpat-", "gitlab token"),
    ("xoxb-", "slack token"),
    ("Bearer ", "authorization header"),
    ("li_at=", "session cookie"),
    ("AQED", "session cookie"),
    ("AQV", "oauth token"),
];

/// Shorter values are never treated as secrets.
const MIN_SECRET_LEN: usize = 8;

/// Every JSON-pointer prefix some code reads. A leaf under none of them is unused.
///
/// - `/reconcile`: platform and pass knobs (pmr-cli -> ReconcileSettings)
/// - `/ledger`: ledger directory
/// - `/sources`: ordered source list, feed locations, env var names
/// - `/audit`: audit trail path and hash chain flag
pub const CONSUMED_POINTERS: &[&str] = &["/reconcile", "/ledger", "/sources", "/audit"];

/// How many unused pointers an error message quotes.
const UNUSED_PREVIEW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted, unique.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Compare the document's leaves against [`CONSUMED_POINTERS`].
///
/// With `Fail`, any unused leaf is an error (CONFIG_UNUSED_KEYS); with
/// `Warn` the report is always returned.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS.iter().map(|p| canonical_pointer(p)).collect();

    let unused: BTreeSet<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !consumed.iter().any(|c| pointer_covers(c, ptr)))
        .collect();

    let report = UnusedKeyReport {
        consumed_prefixes: consumed.into_iter().collect(),
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let preview: Vec<&String> = report.unused_leaf_pointers.iter().take(UNUSED_PREVIEW).collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} config key(s) are not read by anything; \
             remove them or register their section. First few: {:?}",
            report.unused_leaf_pointers.len(),
            preview
        );
    }
    Ok(report)
}

/// CONFIG_SECRET_DETECTED on the first leaf that looks like a credential.
/// The value itself never reaches the error.
pub(crate) fn reject_secret_literals(config_json: &Value) -> Result<()> {
    for (ptr, leaf) in leaves(config_json) {
        if let Some(kind) = leaf.as_str().and_then(secret_kind) {
            bail!("CONFIG_SECRET_DETECTED leaf={ptr} kind={kind} value=REDACTED");
        }
    }
    Ok(())
}

fn secret_kind(s: &str) -> Option<&'static str> {
    let s = s.trim();
    if s.len() < MIN_SECRET_LEN {
        return None;
    }
    SECRET_PREFIXES
        .iter()
        .find(|(prefix, _)| s.starts_with(prefix))
        .map(|(_, kind)| *kind)
}

// ---------------------------------------------------------------------------
// Pointers
// ---------------------------------------------------------------------------

/// Leading `/`, no trailing `/` (the root stays `/`).
fn canonical_pointer(p: &str) -> String {
    let trimmed = p.trim().trim_matches('/');
    format!("/{trimmed}")
}

/// Segment-wise prefix test: `/a/b` covers `/a/b` and `/a/b/c`, not `/a/bc`.
fn pointer_covers(prefix: &str, leaf: &str) -> bool {
    let mut leaf_segments = leaf.split('/').skip(1);
    prefix
        .split('/')
        .skip(1)
        .filter(|s| !s.is_empty())
        .all(|seg| leaf_segments.next() == Some(seg))
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Depth-first `(pointer, leaf)` pairs in document order.
fn leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), root)];
    while let Some((ptr, v)) = stack.pop() {
        match v {
            Value::Object(map) if !map.is_empty() => {
                for (k, child) in map.iter().rev() {
                    stack.push((format!("{ptr}/{}", escape_token(k)), child));
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for (i, child) in items.iter().enumerate().rev() {
                    stack.push((format!("{ptr}/{i}"), child));
                }
            }
            _ if ptr.is_empty() => out.push(("/".to_string(), v)),
            _ => out.push((ptr, v)),
        }
    }
    out
}
