//! Count normalization for metric text scraped from UI labels or returned
//! loosely-typed by APIs.
//!
//! Upstream text is unreliable by nature, so this module never fails:
//! absent, empty, or unparseable input degrades to `0`.
//!
//! Accepted shapes:
//! - thousands separators: `"3,402"`, `"3 402"`, `"3_402"`, NBSP-separated
//! - magnitude suffix `k` / `m` (case-insensitive): `"1.2K"` → 1200, `"3M"` → 3_000_000
//! - trailing unit words: `"34 comments"` → 34, `"1.2K reactions"` → 1200

use serde_json::Value;

/// Max characters kept from a post's text as its content snippet.
pub const SNIPPET_CHARS: usize = 280;

const NBSP: char = '\u{a0}';
const NARROW_NBSP: char = '\u{202f}';

/// Normalize a count string to the nearest non-negative integer.
///
/// Returns `0` for empty or unparseable input.
pub fn normalize_count(raw: &str) -> u64 {
    let chars: Vec<char> = raw.trim().chars().collect();

    let mut digits = String::new();
    let mut seen_dot = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            digits.push(c);
        } else if c == '.' {
            if seen_dot {
                return 0;
            }
            seen_dot = true;
            digits.push(c);
        } else if is_group_separator(c) {
            // A separator only counts when a digit follows; otherwise the number ended.
            let next_is_digit = chars.get(i + 1).map(|n| n.is_ascii_digit()).unwrap_or(false);
            if digits.is_empty() || !next_is_digit {
                break;
            }
        } else {
            break;
        }
        i += 1;
    }

    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return 0;
    }

    // Optional whitespace, then an optional magnitude suffix that is not the
    // start of a longer word ("3 more" is not "3M").
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    let multiplier = match chars.get(i).map(|c| c.to_ascii_lowercase()) {
        Some(s @ ('k' | 'm')) => {
            let standalone = chars
                .get(i + 1)
                .map(|n| !n.is_alphabetic())
                .unwrap_or(true);
            match (s, standalone) {
                ('k', true) => 1_000.0,
                ('m', true) => 1_000_000.0,
                _ => 1.0,
            }
        }
        _ => 1.0,
    };

    let value: f64 = match digits.parse() {
        Ok(v) => v,
        Err(_) => return 0,
    };

    to_count(value * multiplier)
}

/// [`normalize_count`] for optional input; `None` yields `0`.
pub fn normalize_count_opt(raw: Option<&str>) -> u64 {
    raw.map(normalize_count).unwrap_or(0)
}

/// Normalize a JSON value that may carry a count as a number or as text.
///
/// `null`, booleans, objects and arrays yield `0`.
pub fn normalize_json_count(v: &Value) -> u64 {
    match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else {
                n.as_f64().map(to_count).unwrap_or(0)
            }
        }
        Value::String(s) => normalize_count(s),
        _ => 0,
    }
}

/// First [`SNIPPET_CHARS`] characters of `text`, whitespace-trimmed.
pub fn snippet(text: &str) -> String {
    text.trim().chars().take(SNIPPET_CHARS).collect()
}

fn is_group_separator(c: char) -> bool {
    matches!(c, ',' | '_' | ' ' | NBSP | NARROW_NBSP)
}

fn to_count(v: f64) -> u64 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    let r = v.round();
    if r >= u64::MAX as f64 {
        u64::MAX
    } else {
        r as u64
    }
}
