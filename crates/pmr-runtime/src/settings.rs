use std::time::Duration;

use serde::{Deserialize, Serialize};

use pmr_reconcile::WinnerPolicy;

/// Knobs for one pass. Built once and handed to the orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    pub winner_multiplier: f64,
    pub fallback_threshold: u64,
    /// Pause between externally visible operations (fetch, write, append).
    pub inter_operation_delay: Duration,
    /// Records beyond this many stay pending for the next pass.
    pub max_records_per_pass: usize,
    /// Compute write-backs without touching the ledger.
    pub dry_run: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            winner_multiplier: 2.0,
            fallback_threshold: 10,
            inter_operation_delay: Duration::from_millis(1500),
            max_records_per_pass: 50,
            dry_run: false,
        }
    }
}

impl ReconcileSettings {
    /// Defaults with no pacing, for tests.
    pub fn test_defaults() -> Self {
        Self {
            inter_operation_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> WinnerPolicy {
        WinnerPolicy {
            multiplier: self.winner_multiplier,
            fallback_threshold: self.fallback_threshold,
        }
    }
}
