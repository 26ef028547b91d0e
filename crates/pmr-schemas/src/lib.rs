//! pmr-schemas
//!
//! Shared data model for post-metrics reconciliation:
//! - ledger rows ([`LedgerRecord`]) and the fixed tab/column contract
//! - observed metrics ([`PostMetric`]) as produced by every metric source
//! - match outcomes ([`MatchResult`]) and write-back instructions ([`MetricsWriteBack`])
//!
//! Plain data only. No IO.

pub mod ledger;
mod matching;
mod metric;
mod record;

pub use ledger::{EngagementRate, LedgerColumn, MetricsWriteBack, TabSet};
pub use matching::{MatchResult, MatchStrategy};
pub use metric::PostMetric;
pub use record::{LedgerRecord, RowIndex};
