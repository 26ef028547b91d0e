//! Command handler modules for pmr-cli.
//!
//! Shared wiring (config sections to runtime types) lives here.
//! Command-specific logic lives in the submodules.

pub mod audit;
pub mod pending;
pub mod reconcile;

use std::time::Duration;

use anyhow::{Context, Result};
use pmr_config::{FeedLocation, ReconcileSection, ResolvedSession, SourceSpec};
use pmr_runtime::{ReconcileSettings, SourceBinding};
use pmr_sources::{
    build_source, FeedTransport, FileFeedTransport, HttpFeedTransport, SessionContext, SourceKind,
};

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG: u8 = 1;
pub const EXIT_PASS_FAILED: u8 = 2;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub fn reconcile_settings(section: &ReconcileSection, dry_run: bool) -> ReconcileSettings {
    ReconcileSettings {
        winner_multiplier: section.winner_multiplier,
        fallback_threshold: section.fallback_threshold,
        inter_operation_delay: Duration::from_millis(section.inter_operation_delay_ms),
        max_records_per_pass: section.max_records_per_pass,
        dry_run,
    }
}

pub fn session_context(resolved: &ResolvedSession) -> SessionContext {
    let mut ctx = SessionContext::anonymous();
    if let Some(token) = &resolved.token {
        ctx = ctx.with_bearer_token(token.clone());
    }
    if let Some(cookie) = &resolved.cookie {
        ctx = ctx.with_cookie(cookie.clone());
    }
    for (name, value) in &resolved.headers {
        ctx = ctx.with_header(name.clone(), value.clone());
    }
    ctx
}

/// One binding per configured source, in config order.
pub fn build_sources(
    specs: &[SourceSpec],
    sessions: &[ResolvedSession],
) -> Result<Vec<SourceBinding>> {
    specs
        .iter()
        .zip(sessions)
        .enumerate()
        .map(|(i, (spec, resolved))| -> Result<SourceBinding> {
            let kind = SourceKind::parse(&spec.kind)
                .with_context(|| format!("CONFIG_INVALID at /sources/{i}/kind"))?;
            let transport: Box<dyn FeedTransport> = match &spec.feed {
                FeedLocation::File(path) => Box::new(FileFeedTransport::new(path)),
                FeedLocation::Url(url) => Box::new(HttpFeedTransport::new(url.clone())),
            };
            Ok(SourceBinding::new(
                build_source(kind, transport),
                session_context(resolved),
            ))
        })
        .collect()
}
