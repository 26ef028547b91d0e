use chrono::{DateTime, TimeZone, Utc};

use pmr_ledger::MemoryLedger;
use pmr_schemas::{EngagementRate, LedgerRecord, PostMetric, TabSet};

pub const PLATFORM: &str = "LinkedIn";

/// Published text of the reference ledger's pending post.
pub const REFERENCE_CONTENT: &str = "Hello world, this is a test post about systems design.";

pub fn tabs() -> TabSet {
    TabSet::for_platform(PLATFORM)
}

/// Fixed publish time so fixtures are reproducible.
pub fn posted_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Posted, not yet measured.
pub fn posted(row: u64, post_id: &str, platform_post_id: Option<&str>, content: &str) -> LedgerRecord {
    LedgerRecord::posted(row, post_id, platform_post_id, content, posted_at())
}

/// Posted and measured by an earlier pass, with `engagement` recorded.
pub fn measured(row: u64, post_id: &str, engagement: u64) -> LedgerRecord {
    let impressions = 100;
    LedgerRecord {
        impressions: Some(impressions),
        engagement: Some(engagement),
        engagement_rate: Some(EngagementRate::from_counts(engagement, impressions).to_string()),
        winner: Some(false),
        ..posted(row, post_id, None, &format!("earlier post {post_id}"))
    }
}

/// Reference ledger: history `[5, 7, 6]` in rows 2-4, one pending post in
/// row 5 published as `urn:li:share:999`.
pub fn reference_ledger() -> MemoryLedger {
    MemoryLedger::new().with_records(
        &tabs().posted,
        &[
            measured(2, "P-2", 5),
            measured(3, "P-3", 7),
            measured(4, "P-4", 6),
            posted(5, "P-5", Some("urn:li:share:999"), REFERENCE_CONTENT),
        ],
    )
}

/// The metric observed for the reference ledger's pending post: 150/8/4.
pub fn reference_metric() -> PostMetric {
    PostMetric::new("urn:li:share:999", REFERENCE_CONTENT).with_counts(150, 8, 4)
}
