use std::fmt;

use uuid::Uuid;

use pmr_ledger::LedgerError;
use pmr_schemas::{MatchResult, MetricsWriteBack, RowIndex};
use pmr_sources::SourceError;

// ---------------------------------------------------------------------------
// Per-record
// ---------------------------------------------------------------------------

/// The winners-archive copy. Tracked apart from the primary write-back: its
/// failure never undoes or fails the record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecondaryEffect {
    /// Not a winner; nothing to archive.
    NotRequired,
    Applied,
    Failed(String),
    /// Dry run, or the archive already holds this post.
    Skipped,
}

impl SecondaryEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecondaryEffect::NotRequired => "not-required",
            SecondaryEffect::Applied => "applied",
            SecondaryEffect::Failed(_) => "failed",
            SecondaryEffect::Skipped => "skipped",
        }
    }
}

/// A failure confined to one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordError {
    WriteBack(LedgerError),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::WriteBack(e) => write!(f, "write-back failed: {e}"),
        }
    }
}

impl std::error::Error for RecordError {}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordOutcome {
    Reconciled {
        match_result: MatchResult,
        write_back: MetricsWriteBack,
        winner_copy: SecondaryEffect,
    },
    /// No metric paired with the record. It stays pending.
    Unmatched { row_index: RowIndex },
    /// Listed as pending but already measured or never posted. Not touched.
    Ineligible { row_index: RowIndex },
    Failed {
        row_index: RowIndex,
        error: RecordError,
    },
}

impl RecordOutcome {
    pub fn row_index(&self) -> RowIndex {
        match self {
            RecordOutcome::Reconciled { match_result, .. } => match_result.row_index,
            RecordOutcome::Unmatched { row_index }
            | RecordOutcome::Ineligible { row_index }
            | RecordOutcome::Failed { row_index, .. } => *row_index,
        }
    }

    pub fn is_winner(&self) -> bool {
        matches!(self, RecordOutcome::Reconciled { write_back, .. } if write_back.winner)
    }
}

// ---------------------------------------------------------------------------
// Per-pass
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassCounts {
    /// Records the pass attempted (matched, unmatched or failed).
    pub processed: usize,
    pub matched: usize,
    pub winners: usize,
    /// Unmatched or ineligible.
    pub skipped: usize,
    pub failed: usize,
    /// Left pending for a later pass (over the per-pass cap, or after a halt).
    pub deferred: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub tab: String,
    /// Name of the source that supplied metrics; `None` when nothing was pending.
    pub source: Option<&'static str>,
    pub baseline: f64,
    pub threshold: f64,
    pub dry_run: bool,
    pub outcomes: Vec<RecordOutcome>,
    pub deferred: usize,
    /// A rate-limit signal stopped the pass early.
    pub halted: bool,
}

impl PassReport {
    pub fn counts(&self) -> PassCounts {
        let mut c = PassCounts {
            deferred: self.deferred,
            ..PassCounts::default()
        };
        for o in &self.outcomes {
            match o {
                RecordOutcome::Reconciled { write_back, .. } => {
                    c.processed += 1;
                    c.matched += 1;
                    if write_back.winner {
                        c.winners += 1;
                    }
                }
                RecordOutcome::Unmatched { .. } => {
                    c.processed += 1;
                    c.skipped += 1;
                }
                RecordOutcome::Ineligible { .. } => c.skipped += 1,
                RecordOutcome::Failed { .. } => {
                    c.processed += 1;
                    c.failed += 1;
                }
            }
        }
        c
    }

    /// Write-backs that actually reached the ledger.
    pub fn write_backs(&self) -> usize {
        if self.dry_run {
            return 0;
        }
        self.counts().matched
    }

    pub fn summary_line(&self) -> String {
        summary_line(&self.counts(), self.halted)
    }
}

pub(crate) fn summary_line(c: &PassCounts, halted: bool) -> String {
    format!(
        "processed={} matched={} winners={} skipped={} failed={} deferred={} halted={}",
        c.processed, c.matched, c.winners, c.skipped, c.failed, c.deferred, halted
    )
}

/// A failure that stopped the pass before any record could be reconciled.
#[derive(Debug, Clone, PartialEq)]
pub enum PassError {
    /// Reading the ledger failed.
    Ledger(LedgerError),
    /// Every configured source failed (or none was configured).
    NoMetrics {
        /// Eligible records that stay pending.
        pending: usize,
        failures: Vec<(&'static str, SourceError)>,
    },
}

impl PassError {
    /// The summary line for a pass that stopped here. Every pending record is deferred.
    pub fn summary_line(&self) -> String {
        let deferred = match self {
            PassError::Ledger(_) => 0,
            PassError::NoMetrics { pending, .. } => *pending,
        };
        summary_line(
            &PassCounts {
                deferred,
                ..PassCounts::default()
            },
            false,
        )
    }
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassError::Ledger(e) => write!(f, "pass aborted: {e}"),
            PassError::NoMetrics { failures, .. } if failures.is_empty() => {
                write!(f, "no metrics: no source configured")
            }
            PassError::NoMetrics { failures, .. } => {
                write!(f, "no metrics: all sources failed")?;
                for (name, err) in failures {
                    write!(f, "; {name}: {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for PassError {}
