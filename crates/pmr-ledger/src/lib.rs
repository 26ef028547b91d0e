//! pmr-ledger
//!
//! The ledger collaborator: where published posts live and where metrics are
//! written back.
//!
//! - [`Ledger`]: the async contract the orchestrator is written against
//! - [`CsvLedger`]: one `<Tab>.csv` per tab in a directory
//! - [`MemoryLedger`]: in-process tabs with failure injection, for tests
//!
//! Row indexes are spreadsheet row numbers: the header is row 1, the first
//! data row is row 2.

mod csv_ledger;
mod memory;
mod row;
mod table;

use std::fmt;

use pmr_schemas::{LedgerRecord, MetricsWriteBack, RowIndex};

pub use csv_ledger::CsvLedger;
pub use memory::{MemoryLedger, RecordedAppend, RecordedWrite};
pub use table::{RawTable, FIRST_DATA_ROW};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Filesystem or transport failure.
    Io(String),
    /// The named tab does not exist.
    MissingTab(String),
    /// No row at this index in the tab.
    UnknownRow { tab: String, row_index: RowIndex },
    /// The row already carries metrics; write-back happens at most once.
    AlreadyMeasured { tab: String, row_index: RowIndex },
    /// The store signalled throttling. The current pass should stop.
    RateLimited(String),
    /// The tab exists but does not follow the column contract.
    Malformed(String),
}

impl LedgerError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LedgerError::RateLimited(_))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Io(msg) => write!(f, "ledger io error: {msg}"),
            LedgerError::MissingTab(tab) => write!(f, "ledger tab not found: '{tab}'"),
            LedgerError::UnknownRow { tab, row_index } => {
                write!(f, "ledger tab '{tab}' has no row {row_index}")
            }
            LedgerError::AlreadyMeasured { tab, row_index } => {
                write!(f, "ledger tab '{tab}' row {row_index} already has metrics")
            }
            LedgerError::RateLimited(msg) => write!(f, "ledger rate limited: {msg}"),
            LedgerError::Malformed(msg) => write!(f, "ledger malformed: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Result of [`Ledger::append_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Copied; the new row's index in the target tab.
    Appended(RowIndex),
    /// The target tab already holds a row for this post. Nothing written.
    AlreadyPresent,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Persistent ledger of published posts.
///
/// Every call is one externally visible operation; callers pace them.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Records eligible for reconciliation (posted, impressions empty), in row order.
    async fn list_pending(&self, tab: &str) -> Result<Vec<LedgerRecord>, LedgerError>;

    /// Engagement values of already-measured records.
    async fn list_historical_engagement(&self, tab: &str) -> Result<Vec<f64>, LedgerError>;

    /// Set Impressions, Engagement, Engagement Rate and Winner on one row.
    async fn write_metrics(
        &self,
        tab: &str,
        row_index: RowIndex,
        write_back: &MetricsWriteBack,
    ) -> Result<(), LedgerError>;

    /// Copy row `row_index` of `source_tab` to the end of `target_tab`.
    async fn append_row(
        &self,
        source_tab: &str,
        target_tab: &str,
        row_index: RowIndex,
    ) -> Result<AppendOutcome, LedgerError>;

    /// The whole tab, header included, as stored.
    async fn raw_rows(&self, tab: &str) -> Result<RawTable, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            LedgerError::UnknownRow {
                tab: "LinkedInPosted".to_string(),
                row_index: RowIndex(9),
            }
            .to_string(),
            "ledger tab 'LinkedInPosted' has no row 9"
        );
        assert!(LedgerError::RateLimited("quota".to_string()).is_rate_limited());
        assert!(!LedgerError::Io("x".to_string()).is_rate_limited());
    }
}
