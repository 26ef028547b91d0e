use std::collections::HashSet;

use pmr_schemas::{LedgerRecord, MatchResult, MatchStrategy, PostMetric, RowIndex};

/// Normalized characters compared by the exact-prefix stage.
pub const CONTENT_PREFIX_CHARS: usize = 50;
/// Leading words tokenized on each side by the fuzzy stage.
pub const FUZZY_WINDOW_WORDS: usize = 20;
/// Minimum share of ledger tokens that must appear in the metric's tokens.
pub const FUZZY_MIN_OVERLAP: f64 = 0.8;

/// Trailing identifier segment: whatever follows the last `:` or `/`.
///
/// `urn:li:share:999`, `share/999/` and `999` all yield `"999"`. Blank input,
/// or input made only of separators, yields `None`.
pub fn id_suffix(id: &str) -> Option<&str> {
    let trimmed = id.trim().trim_end_matches([':', '/']);
    let suffix = match trimmed.rfind([':', '/']) {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    };
    let suffix = suffix.trim();
    if suffix.is_empty() {
        None
    } else {
        Some(suffix)
    }
}

/// Lower-case, drop punctuation, collapse whitespace runs to one space.
pub fn normalize_content(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn prefix(normalized: &str) -> &str {
    match normalized.char_indices().nth(CONTENT_PREFIX_CHARS) {
        Some((end, _)) => &normalized[..end],
        None => normalized,
    }
}

fn window(normalized: &str) -> Vec<&str> {
    normalized
        .split(' ')
        .filter(|t| !t.is_empty())
        .take(FUZZY_WINDOW_WORDS)
        .collect()
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn match_by_id<'a>(
    record: &LedgerRecord,
    metrics: &'a [PostMetric],
) -> Option<(&'a PostMetric, MatchStrategy)> {
    let wanted = record.platform_post_id().and_then(id_suffix)?;

    metrics.iter().find_map(|m| {
        if id_suffix(&m.primary_id) == Some(wanted) {
            Some((m, MatchStrategy::Id))
        } else if m
            .auxiliary_ids
            .iter()
            .any(|aux| id_suffix(aux) == Some(wanted))
        {
            Some((m, MatchStrategy::AuxiliaryId))
        } else {
            None
        }
    })
}

fn match_by_content<'a>(
    record: &LedgerRecord,
    metrics: &'a [PostMetric],
) -> Option<(&'a PostMetric, MatchStrategy)> {
    let ledger = normalize_content(&record.content);
    if ledger.is_empty() {
        return None;
    }

    let candidates: Vec<(&PostMetric, String)> = metrics
        .iter()
        .map(|m| (m, normalize_content(&m.content_snippet)))
        .filter(|(_, n)| !n.is_empty())
        .collect();

    let ledger_prefix = prefix(&ledger);
    if let Some((m, _)) = candidates.iter().find(|(_, n)| prefix(n) == ledger_prefix) {
        return Some((m, MatchStrategy::ContentExactPrefix));
    }

    let ledger_tokens = window(&ledger);
    candidates.iter().find_map(|(m, n)| {
        let metric_tokens: HashSet<&str> = window(n).into_iter().collect();
        let present = ledger_tokens
            .iter()
            .filter(|t| metric_tokens.contains(*t))
            .count();
        let overlap = present as f64 / ledger_tokens.len() as f64;
        (overlap >= FUZZY_MIN_OVERLAP).then_some((*m, MatchStrategy::ContentFuzzy))
    })
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Pair one ledger record with at most one metric.
///
/// Identifier matching is tried first and content matching only when it
/// yields nothing. Within a stage the first metric (in the given order)
/// that satisfies the rule wins. A malformed platform id behaves as absent.
pub fn resolve(record: &LedgerRecord, metrics: &[PostMetric]) -> Option<MatchResult> {
    let (metric, strategy) =
        match_by_id(record, metrics).or_else(|| match_by_content(record, metrics))?;
    Some(MatchResult {
        row_index: record.row_index,
        metric: metric.clone(),
        strategy,
    })
}

/// [`resolve`] for every record, in ledger order.
pub fn resolve_all(
    records: &[LedgerRecord],
    metrics: &[PostMetric],
) -> Vec<(RowIndex, Option<MatchResult>)> {
    records
        .iter()
        .map(|r| (r.row_index, resolve(r, metrics)))
        .collect()
}
