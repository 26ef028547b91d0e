//! The winner threshold is taken once per pass, from history as it stood
//! before the pass wrote anything.

use std::sync::Arc;

use pmr_ledger::{Ledger, MemoryLedger};
use pmr_runtime::RecordOutcome;
use pmr_schemas::{PostMetric, RowIndex};
use pmr_testkit::{measured, orchestrator, posted, tabs, ScriptedSource};

#[tokio::test]
async fn scenario_later_record_is_judged_against_pre_pass_history() {
    let t = tabs();
    let ledger = Arc::new(MemoryLedger::new().with_records(
        &t.posted,
        &[
            measured(2, "P-2", 5),
            posted(3, "P-3", Some("urn:li:share:301"), "First post of the day"),
            posted(4, "P-4", Some("urn:li:share:302"), "Second post of the day"),
        ],
    ));
    let metrics = vec![
        PostMetric::new("urn:li:share:301", "First post of the day").with_counts(1000, 30, 10),
        PostMetric::new("urn:li:share:302", "Second post of the day").with_counts(500, 6, 4),
    ];
    let orch = orchestrator(
        ledger.clone(),
        vec![ScriptedSource::ok("scripted", metrics).into_binding()],
    );

    let report = orch.run_pass().await.unwrap();

    assert_eq!(report.baseline, 5.0);
    assert_eq!(report.threshold, 10.0);

    let winners: Vec<(RowIndex, u64, bool)> = report
        .outcomes
        .iter()
        .filter_map(|o| match o {
            RecordOutcome::Reconciled { match_result, write_back, .. } => {
                Some((match_result.row_index, write_back.engagement, write_back.winner))
            }
            _ => None,
        })
        .collect();
    // Re-deriving the baseline after row 3 (mean of 5 and 40) would lift the
    // threshold to 45 and make row 4 a loser.
    assert_eq!(winners, vec![(RowIndex(3), 40, true), (RowIndex(4), 10, true)]);
    assert_eq!(ledger.appends().len(), 2);

    let mut history = ledger.list_historical_engagement(&t.posted).await.unwrap();
    history.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(history, vec![5.0, 10.0, 40.0]);
}
