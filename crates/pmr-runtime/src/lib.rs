//! pmr-runtime
//!
//! One reconciliation pass, start to finish:
//!
//! 1. list pending ledger records (return early if there are none)
//! 2. fetch metrics from the first source that answers
//! 3. compute the winner baseline once, from history
//! 4. per record: match, classify, write back, archive winners
//!
//! Records are handled strictly one at a time with a fixed pause between
//! externally visible operations. A record-level failure is logged and the
//! pass moves on; a rate-limit signal stops the pass with partial results.

mod orchestrator;
mod report;
mod settings;

pub use orchestrator::{ReconcileOrchestrator, SourceBinding};
pub use report::{PassCounts, PassError, PassReport, RecordError, RecordOutcome, SecondaryEffect};
pub use settings::ReconcileSettings;
