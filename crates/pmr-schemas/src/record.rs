use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Positional row identifier inside one ledger tab.
///
/// Opaque to the core: it is only ever handed back to the ledger. Unique
/// within a tab and never reused once assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowIndex(pub u64);

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One published post as recorded in the ledger.
///
/// The metric fields (`impressions`, `engagement`, `engagement_rate`,
/// `winner`) stay `None` until a reconciliation pass writes them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub row_index: RowIndex,
    /// The ledger's own "Post ID" column.
    pub post_id: String,
    /// Identifier issued by the publishing platform (URN-like). May be absent or malformed.
    pub platform_post_id: Option<String>,
    /// Exact published text.
    pub content: String,
    pub status: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub impressions: Option<u64>,
    pub engagement: Option<u64>,
    pub engagement_rate: Option<String>,
    pub winner: Option<bool>,
}

impl LedgerRecord {
    /// Minimal constructor for a posted record that has not been measured yet.
    pub fn posted(
        row_index: u64,
        post_id: impl Into<String>,
        platform_post_id: Option<&str>,
        content: impl Into<String>,
        posted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            row_index: RowIndex(row_index),
            post_id: post_id.into(),
            platform_post_id: platform_post_id.map(str::to_string),
            content: content.into(),
            status: "Posted".to_string(),
            posted_at: Some(posted_at),
            impressions: None,
            engagement: None,
            engagement_rate: None,
            winner: None,
        }
    }

    /// Eligible for reconciliation iff it has been posted and impressions are still empty.
    pub fn is_eligible(&self) -> bool {
        self.posted_at.is_some() && self.impressions.is_none()
    }

    /// Platform id with surrounding whitespace removed; blank counts as absent.
    pub fn platform_post_id(&self) -> Option<&str> {
        self.platform_post_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
