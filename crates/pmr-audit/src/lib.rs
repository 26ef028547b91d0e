//! pmr-audit
//!
//! Append-only audit trail of reconciliation passes, one JSON event per line.
//! With the hash chain on, each event carries `hash_prev` and `hash_self`, so
//! any edit to an earlier line is detectable with [`verify_hash_chain`].

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for deterministic event ids.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5c1f_2a7e_93b4_4d0a_8e61_07d2_b9aa_4f13);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEventType {
    PassStart,
    WriteBack,
    WinnerCopy,
    Unmatched,
    RecordFailed,
    PassSummary,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 6] = [
        AuditEventType::PassStart,
        AuditEventType::WriteBack,
        AuditEventType::WinnerCopy,
        AuditEventType::Unmatched,
        AuditEventType::RecordFailed,
        AuditEventType::PassSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::PassStart => "PASS_START",
            AuditEventType::WriteBack => "WRITE_BACK",
            AuditEventType::WinnerCopy => "WINNER_COPY",
            AuditEventType::Unmatched => "UNMATCHED",
            AuditEventType::RecordFailed => "RECORD_FAILED",
            AuditEventType::PassSummary => "PASS_SUMMARY",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub pass_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub event_type: String,
    pub payload: Value,
    /// `hash_self` of the previous line; `None` on the first line or without chaining.
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

impl AuditEvent {
    /// SHA-256 over the canonical line with `hash_self` left out.
    pub fn content_hash(&self) -> Result<String> {
        let unsealed = AuditEvent {
            hash_self: None,
            ..self.clone()
        };
        let canonical = canonical_line(&unsealed)?;
        Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
    }
}

/// Append-only JSONL writer.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    /// `hash_self` of the newest line in the file.
    tip: Option<String>,
    /// Lines in the file so far. Feeds `event_id`.
    count: u64,
}

impl AuditWriter {
    /// Open `path` for appending, creating parent directories.
    ///
    /// An existing log is continued: the line count and the newest
    /// `hash_self` are read back, so one chain spans every pass that wrote
    /// to the file.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("create audit dir {}", dir.display()))?;
        }

        let (count, tip) = if path.exists() {
            let existing = fs::read_to_string(&path)
                .with_context(|| format!("read audit log {}", path.display()))?;
            let events = parse_lines(&existing)?;
            let tip = events.last().and_then(|(_, ev)| ev.hash_self.clone());
            (events.len() as u64, tip)
        } else {
            (0, None)
        };

        Ok(Self {
            path,
            hash_chain,
            tip,
            count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.tip.as_deref()
    }

    /// Lines in the log, including those present before this writer opened it.
    pub fn seq(&self) -> u64 {
        self.count
    }

    pub fn append(
        &mut self,
        pass_id: Uuid,
        event_type: AuditEventType,
        payload: Value,
    ) -> Result<AuditEvent> {
        let mut ev = AuditEvent {
            event_id: derive_event_id(self.tip.as_deref(), &payload, self.count)?,
            pass_id,
            ts_utc: Utc::now(),
            event_type: event_type.as_str().to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };
        if self.hash_chain {
            ev.hash_prev = self.tip.clone();
            ev.hash_self = Some(ev.content_hash()?);
        }

        let line = canonical_line(&ev)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open audit log {}", self.path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("append to {}", self.path.display()))?;

        self.count += 1;
        if self.hash_chain {
            self.tip = ev.hash_self.clone();
        }
        Ok(ev)
    }
}

/// UUID v5 over chain tip, line number and canonical payload.
///
/// No RNG: the same log written twice yields the same ids.
pub fn derive_event_id(prev_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let canonical = serde_json::to_string(payload).context("serialize payload")?;
    let material = format!("{}|{}|{}", prev_hash.unwrap_or("GENESIS"), seq, canonical);
    Ok(Uuid::new_v5(&EVENT_ID_NAMESPACE, material.as_bytes()))
}

/// Compact JSON with object keys in sorted order (serde_json's default map).
fn canonical_line<T: Serialize>(v: &T) -> Result<String> {
    let value = serde_json::to_value(v).context("serialize audit event")?;
    serde_json::to_string(&value).context("render audit event")
}

/// Non-blank lines as `(line_number, event)`, 1-based.
fn parse_lines(content: &str) -> Result<Vec<(usize, AuditEvent)>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            serde_json::from_str(l.trim())
                .map(|ev| (i + 1, ev))
                .with_context(|| format!("parse audit event at line {}", i + 1))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("read audit log {}", path.display()))?;
    verify_hash_chain_str(&content)
}

/// [`verify_hash_chain`] over in-memory JSONL.
///
/// Each line must point at its predecessor's `hash_self` and carry a
/// `hash_self` that matches its own content. A log written without the
/// chain has neither, and verifies. Unparseable lines are an error.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let events = parse_lines(content)?;
    let mut expected_prev: Option<&str> = None;

    for (line, ev) in &events {
        if ev.hash_prev.as_deref() != expected_prev {
            let reason = format!(
                "hash_prev mismatch: expected {:?}, got {:?}",
                expected_prev, ev.hash_prev
            );
            return Ok(VerifyResult::Broken { line: *line, reason });
        }
        if let Some(claimed) = ev.hash_self.as_deref() {
            let actual = ev.content_hash()?;
            if claimed != actual {
                let reason = format!("hash_self mismatch: claimed {claimed}, recomputed {actual}");
                return Ok(VerifyResult::Broken { line: *line, reason });
            }
        }
        expected_prev = ev.hash_self.as_deref();
    }

    Ok(VerifyResult::Valid {
        lines: events.len(),
    })
}

/// Events of one pass, in log order.
pub fn events_for_pass(content: &str, pass_id: Uuid) -> Result<Vec<AuditEvent>> {
    let events: Vec<AuditEvent> = parse_lines(content)?
        .into_iter()
        .map(|(_, ev)| ev)
        .filter(|ev| ev.pass_id == pass_id)
        .collect();
    if events.is_empty() {
        bail!("AUDIT_PASS_NOT_FOUND pass_id={pass_id}");
    }
    Ok(events)
}
