//! Record-level failures never stop the pass; only a rate limit does.

use std::sync::Arc;

use pmr_ledger::{LedgerError, MemoryLedger};
use pmr_runtime::{RecordOutcome, ReconcileSettings, SecondaryEffect};
use pmr_schemas::{PostMetric, RowIndex};
use pmr_testkit::{
    measured, orchestrator, orchestrator_with, posted, reference_ledger, reference_metric, tabs,
    ScriptedSource,
};

fn two_pending() -> MemoryLedger {
    MemoryLedger::new().with_records(
        &tabs().posted,
        &[
            measured(2, "P-2", 5),
            posted(3, "P-3", Some("urn:li:share:31"), "first"),
            posted(4, "P-4", Some("urn:li:share:41"), "second"),
        ],
    )
}

fn metrics() -> Vec<PostMetric> {
    vec![
        PostMetric::new("urn:li:share:31", "first").with_counts(100, 30, 2),
        PostMetric::new("urn:li:share:41", "second").with_counts(100, 1, 0),
    ]
}

#[tokio::test]
async fn scenario_failed_winner_copy_keeps_metrics() {
    let ledger = Arc::new(
        reference_ledger().fail_append(RowIndex(5), LedgerError::Io("winners tab locked".into())),
    );
    let orch = orchestrator(
        ledger.clone(),
        vec![ScriptedSource::ok("scripted", vec![reference_metric()]).into_binding()],
    );

    let report = orch.run_pass().await.unwrap();

    match &report.outcomes[0] {
        RecordOutcome::Reconciled { winner_copy, write_back, .. } => {
            assert!(write_back.winner);
            assert!(matches!(winner_copy, SecondaryEffect::Failed(msg) if msg.contains("winners tab locked")));
        }
        other => panic!("expected Reconciled, got {other:?}"),
    }
    assert_eq!(ledger.writes().len(), 1);
    assert!(ledger.appends().is_empty());
    assert_eq!(report.counts().failed, 0);
    assert!(!report.halted);
}

#[tokio::test]
async fn scenario_write_failure_moves_on_to_next_record() {
    let ledger = Arc::new(two_pending().fail_write(RowIndex(3), LedgerError::Io("cell protected".into())));
    let orch = orchestrator(
        ledger.clone(),
        vec![ScriptedSource::ok("scripted", metrics()).into_binding()],
    );

    let report = orch.run_pass().await.unwrap();

    assert!(matches!(report.outcomes[0], RecordOutcome::Failed { row_index: RowIndex(3), .. }));
    assert!(matches!(report.outcomes[1], RecordOutcome::Reconciled { .. }));
    let written: Vec<RowIndex> = ledger.writes().iter().map(|w| w.row_index).collect();
    assert_eq!(written, vec![RowIndex(4)]);
    assert!(!report.halted);
    assert_eq!(
        report.summary_line(),
        "processed=2 matched=1 winners=0 skipped=0 failed=1 deferred=0 halted=false"
    );
}

#[tokio::test]
async fn scenario_rate_limited_winner_copy_halts_pass() {
    let ledger = Arc::new(
        two_pending().fail_append(RowIndex(3), LedgerError::RateLimited("quota exceeded".into())),
    );
    let orch = orchestrator(
        ledger.clone(),
        vec![ScriptedSource::ok("scripted", metrics()).into_binding()],
    );

    let report = orch.run_pass().await.unwrap();

    assert!(report.halted);
    assert_eq!(report.deferred, 1);
    assert_eq!(report.outcomes.len(), 1);
    // Row 3's metrics stay written; row 4 is left for the next pass.
    assert_eq!(ledger.writes().len(), 1);
    assert_eq!(ledger.records(&tabs().posted)[2].impressions, None);
}

#[tokio::test]
async fn scenario_dry_run_computes_without_writing() {
    let ledger = Arc::new(reference_ledger());
    let settings = ReconcileSettings {
        dry_run: true,
        ..ReconcileSettings::test_defaults()
    };
    let orch = orchestrator_with(
        settings,
        ledger.clone(),
        vec![ScriptedSource::ok("scripted", vec![reference_metric()]).into_binding()],
    );

    let report = orch.run_pass().await.unwrap();

    match &report.outcomes[0] {
        RecordOutcome::Reconciled { write_back, winner_copy, .. } => {
            assert_eq!(write_back.engagement, 12);
            assert_eq!(*winner_copy, SecondaryEffect::Skipped);
        }
        other => panic!("expected Reconciled, got {other:?}"),
    }
    assert!(ledger.writes().is_empty());
    assert!(ledger.appends().is_empty());
    assert_eq!(report.write_backs(), 0);
    assert_eq!(report.counts().matched, 1);
}

#[tokio::test]
async fn scenario_per_pass_cap_leaves_rest_pending() {
    let ledger = Arc::new(two_pending());
    let settings = ReconcileSettings {
        max_records_per_pass: 1,
        ..ReconcileSettings::test_defaults()
    };
    let orch = orchestrator_with(
        settings,
        ledger.clone(),
        vec![ScriptedSource::ok("scripted", metrics()).into_binding()],
    );

    let first = orch.run_pass().await.unwrap();
    assert_eq!((first.counts().matched, first.deferred), (1, 1));

    let second = orch.run_pass().await.unwrap();
    assert_eq!((second.counts().matched, second.deferred), (1, 0));
    assert_eq!(second.outcomes[0].row_index(), RowIndex(4));
}
