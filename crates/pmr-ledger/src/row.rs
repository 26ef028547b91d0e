//! Cell-level codec between ledger rows (strings) and [`LedgerRecord`].
//!
//! Reading is lenient: a cell that cannot be parsed degrades to "absent"
//! rather than failing the whole tab. Two cells are read by presence instead:
//! any non-empty Impressions cell counts as already measured, so a garbled
//! value is never overwritten, and any non-empty Posted At cell counts as
//! posted, so an unfamiliar date layout never hides a row.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use pmr_schemas::{LedgerColumn, LedgerRecord, MetricsWriteBack, RowIndex};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y"];

/// Cell at `col`, or `""` for a short row.
pub(crate) fn cell(cells: &[String], col: LedgerColumn) -> &str {
    cells
        .get(col.position())
        .map(|s| s.trim())
        .unwrap_or("")
}

/// RFC 3339, common sheet datetime layouts (read as UTC), or a bare date.
pub(crate) fn parse_posted_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
        }
    }
    None
}

/// Posted At for eligibility. A non-empty cell in no known layout still
/// marks the row as posted; it reads as the epoch.
fn posted_at_cell(row_index: RowIndex, raw: &str) -> Option<DateTime<Utc>> {
    if raw.trim().is_empty() {
        return None;
    }
    match parse_posted_at(raw) {
        Some(t) => Some(t),
        None => {
            warn!(target: "pmr_ledger", %row_index, posted_at = raw, "unrecognised Posted At layout; row treated as posted");
            Some(DateTime::<Utc>::default())
        }
    }
}

/// Integer cell, tolerating thousands separators and a trailing `.0`.
pub(crate) fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Some(f.round() as u64),
        _ => None,
    }
}

pub(crate) fn parse_winner(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn format_winner(winner: bool) -> &'static str {
    if winner {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

pub(crate) fn record_from_cells(row_index: RowIndex, cells: &[String]) -> LedgerRecord {
    let impressions_raw = cell(cells, LedgerColumn::Impressions);
    let impressions = if impressions_raw.is_empty() {
        None
    } else {
        Some(parse_count(impressions_raw).unwrap_or(0))
    };

    LedgerRecord {
        row_index,
        post_id: cell(cells, LedgerColumn::PostId).to_string(),
        platform_post_id: non_empty(cell(cells, LedgerColumn::PlatformPostId)),
        content: cells
            .get(LedgerColumn::Content.position())
            .cloned()
            .unwrap_or_default(),
        status: cell(cells, LedgerColumn::Status).to_string(),
        posted_at: posted_at_cell(row_index, cell(cells, LedgerColumn::PostedAt)),
        impressions,
        engagement: parse_count(cell(cells, LedgerColumn::Engagement)),
        engagement_rate: non_empty(cell(cells, LedgerColumn::EngagementRate)),
        winner: parse_winner(cell(cells, LedgerColumn::Winner)),
    }
}

pub(crate) fn record_to_cells(record: &LedgerRecord) -> Vec<String> {
    let mut cells = vec![String::new(); LedgerColumn::ALL.len()];
    cells[LedgerColumn::PostId.position()] = record.post_id.clone();
    cells[LedgerColumn::Content.position()] = record.content.clone();
    cells[LedgerColumn::Status.position()] = record.status.clone();
    cells[LedgerColumn::PostedAt.position()] = record
        .posted_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    cells[LedgerColumn::PlatformPostId.position()] =
        record.platform_post_id.clone().unwrap_or_default();
    cells[LedgerColumn::Impressions.position()] = record
        .impressions
        .map(|n| n.to_string())
        .unwrap_or_default();
    cells[LedgerColumn::Engagement.position()] = record
        .engagement
        .map(|n| n.to_string())
        .unwrap_or_default();
    cells[LedgerColumn::EngagementRate.position()] =
        record.engagement_rate.clone().unwrap_or_default();
    cells[LedgerColumn::Winner.position()] = record
        .winner
        .map(|w| format_winner(w).to_string())
        .unwrap_or_default();
    cells
}

/// Overwrite the four metric cells of `cells`, padding a short row first.
pub(crate) fn apply_write_back(cells: &mut Vec<String>, wb: &MetricsWriteBack) {
    if cells.len() < LedgerColumn::ALL.len() {
        cells.resize(LedgerColumn::ALL.len(), String::new());
    }
    cells[LedgerColumn::Impressions.position()] = wb.impressions.to_string();
    cells[LedgerColumn::Engagement.position()] = wb.engagement.to_string();
    cells[LedgerColumn::EngagementRate.position()] = wb.engagement_rate.to_string();
    cells[LedgerColumn::Winner.position()] = format_winner(wb.winner).to_string();
}
