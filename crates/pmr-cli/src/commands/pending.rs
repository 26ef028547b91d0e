//! `pmr pending`: what the next pass would try to reconcile.

use std::path::Path;

use anyhow::{Context, Result};
use pmr_ledger::{CsvLedger, Ledger};
use pmr_schemas::TabSet;

use super::{EXIT_OK, EXIT_PASS_FAILED};

pub async fn run(ledger_dir: &Path, platform: &str) -> Result<u8> {
    let ledger = CsvLedger::open(ledger_dir)
        .with_context(|| format!("open ledger dir {}", ledger_dir.display()))?;
    let tab = TabSet::for_platform(platform).posted;

    let records = match ledger.list_pending(&tab).await {
        Ok(records) => records,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(EXIT_PASS_FAILED);
        }
    };

    let eligible: Vec<_> = records.into_iter().filter(|r| r.is_eligible()).collect();
    for r in &eligible {
        println!(
            "row_index={} post_id={} platform_post_id={} posted_at={}",
            r.row_index,
            r.post_id,
            r.platform_post_id().unwrap_or("-"),
            r.posted_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        );
    }
    println!("pending={} tab={}", eligible.len(), tab);
    Ok(EXIT_OK)
}
