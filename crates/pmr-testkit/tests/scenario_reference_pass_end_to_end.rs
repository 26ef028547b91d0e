//! Reference pass: row 5 published as `urn:li:share:999`, metric 150/8/4,
//! history [5, 7, 6]. Then the same pass again with nothing new.

use std::sync::Arc;

use pmr_ledger::RecordedAppend;
use pmr_runtime::{RecordOutcome, SecondaryEffect};
use pmr_schemas::{LedgerColumn, MatchStrategy, MetricsWriteBack, RowIndex};
use pmr_ledger::MemoryLedger;
use pmr_schemas::PostMetric;
use pmr_testkit::{
    measured, orchestrator, posted, reference_ledger, reference_metric, tabs, ScriptedSource,
    REFERENCE_CONTENT,
};

#[tokio::test]
async fn scenario_reference_pass_writes_back_and_archives_winner() {
    let ledger = Arc::new(reference_ledger());
    let source = ScriptedSource::ok("scripted", vec![reference_metric()]);
    let orch = orchestrator(ledger.clone(), vec![source.into_binding()]);

    let report = orch.run_pass().await.unwrap();

    assert_eq!(report.source, Some("scripted"));
    assert_eq!(report.baseline, 6.0);
    assert_eq!(report.threshold, 12.0);
    assert_eq!(report.outcomes.len(), 1);
    match &report.outcomes[0] {
        RecordOutcome::Reconciled {
            match_result,
            write_back,
            winner_copy,
        } => {
            assert_eq!(match_result.row_index, RowIndex(5));
            assert_eq!(match_result.strategy, MatchStrategy::Id);
            assert_eq!(*write_back, MetricsWriteBack::new(150, 12, true));
            assert_eq!(write_back.engagement_rate.to_string(), "8.00%");
            assert_eq!(*winner_copy, SecondaryEffect::Applied);
        }
        other => panic!("expected Reconciled, got {other:?}"),
    }

    let t = tabs();
    let writes = ledger.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].row_index, RowIndex(5));
    assert_eq!(
        ledger.appends(),
        vec![RecordedAppend {
            source_tab: t.posted.clone(),
            target_tab: t.winners.clone(),
            row_index: RowIndex(5),
        }]
    );
    assert_eq!(
        ledger.cell(&t.posted, RowIndex(5), LedgerColumn::EngagementRate).as_deref(),
        Some("8.00%")
    );
    assert_eq!(
        ledger.cell(&t.posted, RowIndex(5), LedgerColumn::Winner).as_deref(),
        Some("TRUE")
    );
    assert_eq!(
        report.summary_line(),
        "processed=1 matched=1 winners=1 skipped=0 failed=0 deferred=0 halted=false"
    );
}

#[tokio::test]
async fn scenario_second_pass_is_a_no_op() {
    let ledger = Arc::new(reference_ledger());
    let source = ScriptedSource::ok("scripted", vec![reference_metric()]);
    let counter = source.counter();
    let orch = orchestrator(ledger.clone(), vec![source.into_binding()]);

    orch.run_pass().await.unwrap();
    let writes_after_first = ledger.writes().len();
    let appends_after_first = ledger.appends().len();

    let second = orch.run_pass().await.unwrap();

    assert_eq!(ledger.writes().len(), writes_after_first);
    assert_eq!(ledger.appends().len(), appends_after_first);
    assert_eq!(second.write_backs(), 0);
    assert!(second.outcomes.is_empty());
    // Nothing pending: the source is not even asked.
    assert_eq!(counter.get(), 1);
}

#[tokio::test]
async fn scenario_reference_post_without_id_matches_on_text() {
    let ledger = Arc::new(MemoryLedger::new().with_records(
        &tabs().posted,
        &[
            measured(2, "P-2", 5),
            measured(3, "P-3", 7),
            measured(4, "P-4", 6),
            posted(5, "P-5", None, REFERENCE_CONTENT),
        ],
    ));
    let metric = PostMetric::new("urn:li:share:999", REFERENCE_CONTENT).with_counts(150, 8, 4);
    let orch = orchestrator(ledger.clone(), vec![ScriptedSource::ok("scripted", vec![metric]).into_binding()]);

    let report = orch.run_pass().await.unwrap();

    match &report.outcomes[0] {
        RecordOutcome::Reconciled { match_result, write_back, .. } => {
            assert_eq!(match_result.strategy, MatchStrategy::ContentExactPrefix);
            assert_eq!(*write_back, MetricsWriteBack::new(150, 12, true));
        }
        other => panic!("expected Reconciled, got {other:?}"),
    }
}
