//! pmr-reconcile
//!
//! Pairs ledger records with observed metrics and decides winners.
//!
//! - Matcher: identifier suffix first, then content (exact prefix, then fuzzy token overlap).
//!   Strict priority, first success wins, no backtracking.
//! - Classifier: adaptive threshold from historical engagement, with an
//!   absolute fallback when there is no history yet.
//!
//! Deterministic, pure logic. No IO. No source or ledger calls.

mod classifier;
mod matcher;

pub use classifier::{baseline, classify, WinnerPolicy};
pub use matcher::{
    id_suffix, normalize_content, resolve, resolve_all, CONTENT_PREFIX_CHARS, FUZZY_MIN_OVERLAP,
    FUZZY_WINDOW_WORDS,
};
