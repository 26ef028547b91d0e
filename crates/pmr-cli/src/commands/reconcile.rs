//! `pmr reconcile`: config -> sources + ledger -> one pass -> summary line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use pmr_audit::{AuditEventType, AuditWriter};
use pmr_config::{parse_settings, report_unused_keys, resolve_session_secrets, UnusedKeyPolicy};
use pmr_ledger::CsvLedger;
use pmr_runtime::{PassError, PassReport, ReconcileOrchestrator, RecordOutcome, SecondaryEffect};
use pmr_schemas::TabSet;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{build_sources, reconcile_settings, EXIT_OK, EXIT_PASS_FAILED};

pub struct ReconcileArgs {
    pub config_paths: Vec<String>,
    pub dry_run: bool,
    pub ledger_dir: Option<PathBuf>,
    pub platform: Option<String>,
}

pub async fn run(args: ReconcileArgs) -> Result<u8> {
    let loaded = pmr_config::load_layered_yaml(&args.config_paths)?;

    // A dry run tolerates stray keys so a draft config can be tried out.
    let unused_policy = if args.dry_run {
        UnusedKeyPolicy::Warn
    } else {
        UnusedKeyPolicy::Fail
    };
    let unused = report_unused_keys(&loaded.config_json, unused_policy)?;
    if !unused.is_clean() {
        warn!(target: "pmr_cli", keys = ?unused.unused_leaf_pointers, "unused config keys");
    }

    let mut settings = parse_settings(&loaded.config_json)?;
    if let Some(platform) = args.platform {
        if platform.trim().is_empty() {
            bail!("invalid --platform: must not be blank");
        }
        settings.reconcile.platform = platform;
    }
    let ledger_dir = args
        .ledger_dir
        .or_else(|| settings.ledger.dir.clone())
        .context("CONFIG_INVALID at /ledger/dir: not set (or pass --ledger-dir)")?;

    let sessions = resolve_session_secrets(&settings.sources)?;
    let sources = build_sources(&settings.sources, &sessions)?;
    let source_names: Vec<&str> = sources.iter().map(|b| b.source.name()).collect();

    let ledger = CsvLedger::open(&ledger_dir)
        .with_context(|| format!("open ledger dir {}", ledger_dir.display()))?;
    let tabs = TabSet::for_platform(&settings.reconcile.platform);
    let tab = tabs.posted.clone();

    let mut audit = match &settings.audit.path {
        Some(path) => Some(AuditWriter::new(path, settings.audit.hash_chain)?),
        None => None,
    };

    let pass_id = Uuid::new_v4();
    info!(
        target: "pmr_cli",
        %pass_id,
        config_hash = %loaded.config_hash,
        tab = %tab,
        sources = ?source_names,
        dry_run = args.dry_run,
        "starting pass"
    );
    if let Some(w) = audit.as_mut() {
        w.append(
            pass_id,
            AuditEventType::PassStart,
            json!({
                "config_hash": loaded.config_hash,
                "tab": tab,
                "sources": source_names,
                "dry_run": args.dry_run,
            }),
        )?;
    }

    let orchestrator = ReconcileOrchestrator::new(
        reconcile_settings(&settings.reconcile, args.dry_run),
        tabs,
        Arc::new(ledger),
        sources,
    );
    let result = orchestrator.run_pass_with_id(pass_id).await;

    let (summary, code) = match &result {
        Ok(report) => (report.summary_line(), EXIT_OK),
        Err(e) => {
            error!(target: "pmr_cli", %pass_id, error = %e, "pass failed");
            (e.summary_line(), EXIT_PASS_FAILED)
        }
    };

    // The pass already happened; a broken audit file must not change its result.
    if let Some(w) = audit.as_mut() {
        if let Err(e) = record_pass(w, pass_id, &result, code) {
            warn!(target: "pmr_cli", %pass_id, error = %format!("{e:#}"), "audit write failed");
        }
    }

    println!("{summary}");
    Ok(code)
}

fn record_pass(
    w: &mut AuditWriter,
    pass_id: Uuid,
    result: &Result<PassReport, PassError>,
    exit_code: u8,
) -> Result<()> {
    match result {
        Ok(report) => {
            for outcome in &report.outcomes {
                for (event_type, payload) in outcome_events(outcome, report.dry_run) {
                    w.append(pass_id, event_type, payload)?;
                }
            }
            w.append(pass_id, AuditEventType::PassSummary, summary_payload(report, exit_code))?;
        }
        Err(e) => {
            w.append(
                pass_id,
                AuditEventType::PassSummary,
                json!({
                    "summary": e.summary_line(),
                    "error": e.to_string(),
                    "exit_code": exit_code,
                }),
            )?;
        }
    }
    Ok(())
}

/// Audit events for one record outcome. Ineligible rows produce none.
fn outcome_events(outcome: &RecordOutcome, dry_run: bool) -> Vec<(AuditEventType, Value)> {
    match outcome {
        RecordOutcome::Reconciled {
            match_result,
            write_back,
            winner_copy,
        } => {
            let row_index = match_result.row_index;
            let mut events = vec![(
                AuditEventType::WriteBack,
                json!({
                    "row_index": row_index,
                    "metric_id": match_result.metric.primary_id,
                    "strategy": match_result.strategy,
                    "impressions": write_back.impressions,
                    "engagement": write_back.engagement,
                    "engagement_rate": write_back.engagement_rate,
                    "winner": write_back.winner,
                    "dry_run": dry_run,
                }),
            )];
            if *winner_copy != SecondaryEffect::NotRequired {
                let error = match winner_copy {
                    SecondaryEffect::Failed(msg) => Some(msg.as_str()),
                    _ => None,
                };
                events.push((
                    AuditEventType::WinnerCopy,
                    json!({
                        "row_index": row_index,
                        "effect": winner_copy.as_str(),
                        "error": error,
                    }),
                ));
            }
            events
        }
        RecordOutcome::Unmatched { row_index } => {
            vec![(AuditEventType::Unmatched, json!({ "row_index": row_index }))]
        }
        RecordOutcome::Failed { row_index, error } => vec![(
            AuditEventType::RecordFailed,
            json!({ "row_index": row_index, "error": error.to_string() }),
        )],
        RecordOutcome::Ineligible { .. } => Vec::new(),
    }
}

fn summary_payload(report: &PassReport, exit_code: u8) -> Value {
    let c = report.counts();
    json!({
        "summary": report.summary_line(),
        "tab": report.tab,
        "source": report.source,
        "baseline": report.baseline,
        "threshold": report.threshold,
        "processed": c.processed,
        "matched": c.matched,
        "winners": c.winners,
        "skipped": c.skipped,
        "failed": c.failed,
        "deferred": c.deferred,
        "halted": report.halted,
        "write_backs": report.write_backs(),
        "exit_code": exit_code,
    })
}
