use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use pmr_ledger::{AppendOutcome, Ledger};
use pmr_reconcile::{baseline, classify, resolve, WinnerPolicy};
use pmr_schemas::{
    LedgerColumn, LedgerRecord, MatchResult, MetricsWriteBack, PostMetric, TabSet,
};
use pmr_sources::{MetricSource, SessionContext, SourceError};

use crate::report::{PassError, PassReport, RecordError, RecordOutcome, SecondaryEffect};
use crate::settings::ReconcileSettings;

/// A source together with the session it is fetched with.
pub struct SourceBinding {
    pub source: Box<dyn MetricSource>,
    pub session: SessionContext,
}

impl SourceBinding {
    pub fn new(source: Box<dyn MetricSource>, session: SessionContext) -> Self {
        Self { source, session }
    }

    pub fn anonymous(source: Box<dyn MetricSource>) -> Self {
        Self::new(source, SessionContext::anonymous())
    }
}

/// Sleeps between externally visible operations, never before the first.
struct Pacer {
    delay: Duration,
    started: bool,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: false,
        }
    }

    async fn wait(&mut self) {
        if self.started && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.started = true;
    }
}

pub struct ReconcileOrchestrator {
    settings: ReconcileSettings,
    tabs: TabSet,
    ledger: Arc<dyn Ledger>,
    sources: Vec<SourceBinding>,
}

impl ReconcileOrchestrator {
    /// `sources` are tried in order; the first to answer supplies the pass.
    pub fn new(
        settings: ReconcileSettings,
        tabs: TabSet,
        ledger: Arc<dyn Ledger>,
        sources: Vec<SourceBinding>,
    ) -> Self {
        Self {
            settings,
            tabs,
            ledger,
            sources,
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    pub fn tabs(&self) -> &TabSet {
        &self.tabs
    }

    /// Run one pass. No state survives between calls.
    pub async fn run_pass(&self) -> Result<PassReport, PassError> {
        self.run_pass_with_id(Uuid::new_v4()).await
    }

    /// [`run_pass`](Self::run_pass) under a caller-chosen id, so events
    /// recorded before the pass starts can carry it.
    pub async fn run_pass_with_id(&self, pass_id: Uuid) -> Result<PassReport, PassError> {
        let tab = self.tabs.posted.as_str();
        let policy = self.settings.policy();
        let mut pacer = Pacer::new(self.settings.inter_operation_delay);

        info!(target: "pmr_runtime", %pass_id, tab, dry_run = self.settings.dry_run, "reconcile pass start");

        // 1) Pending records.
        pacer.wait().await;
        let listed = self
            .ledger
            .list_pending(tab)
            .await
            .map_err(PassError::Ledger)?;

        let mut outcomes = Vec::new();
        let mut pending: Vec<LedgerRecord> = Vec::new();
        for r in listed {
            if r.is_eligible() {
                pending.push(r);
            } else {
                debug!(target: "pmr_runtime", %pass_id, row_index = %r.row_index, "listed record is not eligible; left untouched");
                outcomes.push(RecordOutcome::Ineligible {
                    row_index: r.row_index,
                });
            }
        }

        let mut report = PassReport {
            pass_id,
            tab: tab.to_string(),
            source: None,
            baseline: 0.0,
            threshold: policy.threshold(0.0),
            dry_run: self.settings.dry_run,
            outcomes,
            deferred: 0,
            halted: false,
        };

        if pending.is_empty() {
            info!(target: "pmr_runtime", %pass_id, "no pending records");
            return Ok(report);
        }

        if pending.len() > self.settings.max_records_per_pass {
            report.deferred = pending.len() - self.settings.max_records_per_pass;
            pending.truncate(self.settings.max_records_per_pass);
            info!(target: "pmr_runtime", %pass_id, deferred = report.deferred, "per-pass cap reached");
        }

        // 2) Metrics from the first source that answers.
        let (source, metrics) = match self
            .fetch_metrics(pass_id, &mut pacer, pending.len() + report.deferred)
            .await?
        {
            Some(fetched) => fetched,
            None => {
                report.halted = true;
                report.deferred += pending.len();
                warn!(target: "pmr_runtime", %pass_id, deferred = report.deferred, "sources rate limited; halting pass");
                return Ok(report);
            }
        };
        report.source = Some(source);

        // 3) Baseline, once, before any write of this pass.
        pacer.wait().await;
        let history = self
            .ledger
            .list_historical_engagement(tab)
            .await
            .map_err(PassError::Ledger)?;
        report.baseline = baseline(&history);
        report.threshold = policy.threshold(report.baseline);
        info!(
            target: "pmr_runtime",
            %pass_id,
            source,
            metrics = metrics.len(),
            pending = pending.len(),
            baseline = report.baseline,
            threshold = report.threshold,
            "metrics fetched"
        );

        self.hydrate_content(pass_id, &mut pacer, &mut pending).await;

        // 4) Records, strictly in order.
        let mut remaining = pending.len();
        for record in &pending {
            remaining -= 1;
            let (outcome, halt) = self
                .reconcile_record(pass_id, &mut pacer, &policy, report.baseline, record, &metrics)
                .await;
            report.outcomes.push(outcome);
            if halt {
                warn!(target: "pmr_runtime", %pass_id, left = remaining, "rate limited by ledger; halting pass");
                report.halted = true;
                report.deferred += remaining;
                break;
            }
        }

        info!(target: "pmr_runtime", %pass_id, summary = %report.summary_line(), "reconcile pass done");
        Ok(report)
    }

    async fn fetch_metrics(
        &self,
        pass_id: Uuid,
        pacer: &mut Pacer,
        pending: usize,
    ) -> Result<Option<(&'static str, Vec<PostMetric>)>, PassError> {
        let mut failures: Vec<(&'static str, SourceError)> = Vec::new();
        for binding in &self.sources {
            let name = binding.source.name();
            pacer.wait().await;
            match binding.source.fetch(&binding.session).await {
                Ok(metrics) => return Ok(Some((name, metrics))),
                Err(e) => {
                    warn!(target: "pmr_runtime", %pass_id, source = name, error = %e, "source failed; trying next");
                    failures.push((name, e));
                }
            }
        }
        // Throttling is a partial success: everything stays pending for the next pass.
        if failures.iter().any(|(_, e)| e.is_rate_limited()) {
            return Ok(None);
        }
        Err(PassError::NoMetrics { pending, failures })
    }

    /// Fill empty content from the raw tab. Best effort: on failure the
    /// records keep empty content and can still match by identifier.
    async fn hydrate_content(&self, pass_id: Uuid, pacer: &mut Pacer, pending: &mut [LedgerRecord]) {
        if pending.iter().all(|r| !r.content.trim().is_empty()) {
            return;
        }
        pacer.wait().await;
        let raw = match self.ledger.raw_rows(&self.tabs.posted).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(target: "pmr_runtime", %pass_id, error = %e, "content hydration skipped");
                return;
            }
        };
        for r in pending.iter_mut().filter(|r| r.content.trim().is_empty()) {
            if let Some(text) = raw
                .row(r.row_index)
                .and_then(|cells| cells.get(LedgerColumn::Content.position()))
            {
                r.content = text.clone();
            }
        }
    }

    async fn reconcile_record(
        &self,
        pass_id: Uuid,
        pacer: &mut Pacer,
        policy: &WinnerPolicy,
        baseline: f64,
        record: &LedgerRecord,
        metrics: &[PostMetric],
    ) -> (RecordOutcome, bool) {
        let row_index = record.row_index;
        let Some(match_result) = resolve(record, metrics) else {
            info!(target: "pmr_runtime", %pass_id, %row_index, post_id = %record.post_id, "no metric matched");
            return (RecordOutcome::Unmatched { row_index }, false);
        };

        let engagement = match_result.metric.engagement();
        let winner = classify(engagement, baseline, policy);
        let write_back = MetricsWriteBack::new(match_result.metric.impressions, engagement, winner);

        if self.settings.dry_run {
            info!(
                target: "pmr_runtime",
                %pass_id,
                %row_index,
                strategy = %match_result.strategy,
                engagement,
                winner,
                "dry run; write-back computed"
            );
            let winner_copy = if winner {
                SecondaryEffect::Skipped
            } else {
                SecondaryEffect::NotRequired
            };
            let outcome = RecordOutcome::Reconciled {
                match_result,
                write_back,
                winner_copy,
            };
            return (outcome, false);
        }

        pacer.wait().await;
        if let Err(e) = self
            .ledger
            .write_metrics(&self.tabs.posted, row_index, &write_back)
            .await
        {
            warn!(target: "pmr_runtime", %pass_id, %row_index, error = %e, "write-back failed");
            let halt = e.is_rate_limited();
            let outcome = RecordOutcome::Failed {
                row_index,
                error: RecordError::WriteBack(e),
            };
            return (outcome, halt);
        }
        info!(
            target: "pmr_runtime",
            %pass_id,
            %row_index,
            strategy = %match_result.strategy,
            impressions = write_back.impressions,
            engagement,
            rate = %write_back.engagement_rate,
            winner,
            "record reconciled"
        );

        let (winner_copy, halt) = if winner {
            self.archive_winner(pass_id, pacer, &match_result).await
        } else {
            (SecondaryEffect::NotRequired, false)
        };

        let outcome = RecordOutcome::Reconciled {
            match_result,
            write_back,
            winner_copy,
        };
        (outcome, halt)
    }

    async fn archive_winner(
        &self,
        pass_id: Uuid,
        pacer: &mut Pacer,
        match_result: &MatchResult,
    ) -> (SecondaryEffect, bool) {
        pacer.wait().await;
        let row_index = match_result.row_index;
        match self
            .ledger
            .append_row(&self.tabs.posted, &self.tabs.winners, row_index)
            .await
        {
            Ok(AppendOutcome::Appended(at)) => {
                info!(target: "pmr_runtime", %pass_id, %row_index, winners_row = %at, "winner archived");
                (SecondaryEffect::Applied, false)
            }
            Ok(AppendOutcome::AlreadyPresent) => {
                debug!(target: "pmr_runtime", %pass_id, %row_index, "winner already archived");
                (SecondaryEffect::Skipped, false)
            }
            Err(e) => {
                warn!(target: "pmr_runtime", %pass_id, %row_index, error = %e, "winner archive failed; metrics kept");
                (SecondaryEffect::Failed(e.to_string()), e.is_rate_limited())
            }
        }
    }
}
