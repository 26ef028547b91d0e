//! Ledger tab naming, fixed column order, and the metrics write-back shape.
//!
//! The ledger itself is an external collaborator; this module only pins the
//! contract both sides agree on.

use std::fmt;

use serde::{Serialize, Serializer};

/// Tab names for one platform: `{platform}Queue`, `{platform}Posted`, `{platform}Winners`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabSet {
    pub queue: String,
    pub posted: String,
    pub winners: String,
}

impl TabSet {
    pub fn for_platform(platform: &str) -> Self {
        let p = platform.trim();
        Self {
            queue: format!("{p}Queue"),
            posted: format!("{p}Posted"),
            winners: format!("{p}Winners"),
        }
    }
}

/// Fixed column positions. Order matters: it is the on-disk layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LedgerColumn {
    PostId,
    Content,
    Status,
    ScheduledTime,
    PostedAt,
    PlatformPostId,
    Impressions,
    Engagement,
    EngagementRate,
    Winner,
}

impl LedgerColumn {
    pub const ALL: [LedgerColumn; 10] = [
        LedgerColumn::PostId,
        LedgerColumn::Content,
        LedgerColumn::Status,
        LedgerColumn::ScheduledTime,
        LedgerColumn::PostedAt,
        LedgerColumn::PlatformPostId,
        LedgerColumn::Impressions,
        LedgerColumn::Engagement,
        LedgerColumn::EngagementRate,
        LedgerColumn::Winner,
    ];

    /// Zero-based column position.
    pub fn position(&self) -> usize {
        *self as usize
    }

    pub fn header(&self) -> &'static str {
        match self {
            LedgerColumn::PostId => "Post ID",
            LedgerColumn::Content => "Content",
            LedgerColumn::Status => "Status",
            LedgerColumn::ScheduledTime => "Scheduled Time",
            LedgerColumn::PostedAt => "Posted At",
            LedgerColumn::PlatformPostId => "Platform Post ID",
            LedgerColumn::Impressions => "Impressions",
            LedgerColumn::Engagement => "Engagement",
            LedgerColumn::EngagementRate => "Engagement Rate",
            LedgerColumn::Winner => "Winner",
        }
    }

    pub fn headers() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.header()).collect()
    }
}

/// engagement / impressions, kept as a percentage.
///
/// Renders with two decimals and a `%` sign (`"8.00%"`). Zero impressions
/// yield the zero rate `"0.00%"`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngagementRate(f64);

impl EngagementRate {
    pub const ZERO: EngagementRate = EngagementRate(0.0);

    pub fn from_counts(engagement: u64, impressions: u64) -> Self {
        if impressions == 0 {
            return Self::ZERO;
        }
        Self(engagement as f64 * 100.0 / impressions as f64)
    }

    pub fn percent(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for EngagementRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

impl Serialize for EngagementRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Metric cells written back to one ledger row after a successful match.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsWriteBack {
    pub impressions: u64,
    pub engagement: u64,
    pub engagement_rate: EngagementRate,
    pub winner: bool,
}

impl MetricsWriteBack {
    pub fn new(impressions: u64, engagement: u64, winner: bool) -> Self {
        Self {
            impressions,
            engagement,
            engagement_rate: EngagementRate::from_counts(engagement, impressions),
            winner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_names_use_platform_suffixes() {
        let tabs = TabSet::for_platform("LinkedIn");
        assert_eq!(tabs.queue, "LinkedInQueue");
        assert_eq!(tabs.posted, "LinkedInPosted");
        assert_eq!(tabs.winners, "LinkedInWinners");
    }

    #[test]
    fn column_positions_follow_contract_order() {
        assert_eq!(LedgerColumn::PostId.position(), 0);
        assert_eq!(LedgerColumn::PlatformPostId.position(), 5);
        assert_eq!(LedgerColumn::Winner.position(), 9);
        assert_eq!(LedgerColumn::headers().len(), 10);
    }

    #[test]
    fn engagement_rate_formats_two_decimals() {
        assert_eq!(EngagementRate::from_counts(12, 150).to_string(), "8.00%");
        assert_eq!(EngagementRate::from_counts(1, 3).to_string(), "33.33%");
    }

    #[test]
    fn zero_impressions_yield_zero_rate() {
        assert_eq!(EngagementRate::from_counts(7, 0).to_string(), "0.00%");
    }

    #[test]
    fn write_back_serializes_rate_as_string() {
        let wb = MetricsWriteBack::new(150, 12, true);
        let v = serde_json::to_value(&wb).unwrap();
        assert_eq!(v["engagement_rate"], "8.00%");
        assert_eq!(v["winner"], true);
    }
}
