//! pmr-testkit
//!
//! Shared pieces for end-to-end pass scenarios under `tests/`:
//! - [`ScriptedSource`]: a metric source that answers from a script and counts fetches
//! - record and metric fixtures, including the reference scenario ledger
//! - [`orchestrator`]: a pass over a [`MemoryLedger`] with no pacing

mod fixtures;
mod sources;

use std::sync::Arc;

use pmr_ledger::MemoryLedger;
use pmr_runtime::{ReconcileOrchestrator, ReconcileSettings, SourceBinding};
use pmr_schemas::TabSet;

pub use fixtures::{
    measured, posted, posted_at, reference_ledger, reference_metric, tabs, PLATFORM,
    REFERENCE_CONTENT,
};
pub use sources::{FetchCounter, ScriptedSource};

/// Orchestrator over `ledger` with test defaults (no pacing, live writes).
pub fn orchestrator(ledger: Arc<MemoryLedger>, sources: Vec<SourceBinding>) -> ReconcileOrchestrator {
    orchestrator_with(ReconcileSettings::test_defaults(), ledger, sources)
}

pub fn orchestrator_with(
    settings: ReconcileSettings,
    ledger: Arc<MemoryLedger>,
    sources: Vec<SourceBinding>,
) -> ReconcileOrchestrator {
    ReconcileOrchestrator::new(settings, TabSet::for_platform(PLATFORM), ledger, sources)
}
