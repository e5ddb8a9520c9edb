//! Text normalization shared by both backends.
//!
//! Text equality and pattern operators are accent- and case-insensitive. The SQL
//! backend lowers parameters here and relies on `ILIKE`/collations for the column;
//! the in-memory backend normalizes both sides here, so fixtures agree.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::ast::{ComparisonOperator, InMode};

/// Strip diacritics and lower-case.
pub fn normalize_text(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Escape LIKE metacharacters with a backslash.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build the LIKE pattern for a text operator from a normalized value.
///
/// `like` values use `*` as the wildcard; everything else is literal.
pub fn like_pattern(operator: ComparisonOperator, value: &str) -> String {
    match operator {
        ComparisonOperator::StartsWith => format!("{}%", escape_like(value)),
        ComparisonOperator::EndsWith => format!("%{}", escape_like(value)),
        ComparisonOperator::Contains => format!("%{}%", escape_like(value)),
        ComparisonOperator::Like => escape_like(value).replace('*', "%"),
        _ => escape_like(value),
    }
}

pub fn in_mode_operator(mode: InMode) -> ComparisonOperator {
    match mode {
        InMode::Eq => ComparisonOperator::Eq,
        InMode::StartsWith => ComparisonOperator::StartsWith,
        InMode::EndsWith => ComparisonOperator::EndsWith,
        InMode::Contains => ComparisonOperator::Contains,
    }
}

/// In-memory counterpart of [`like_pattern`]; both sides already normalized.
pub fn text_matches(operator: ComparisonOperator, haystack: &str, needle: &str) -> bool {
    match operator {
        ComparisonOperator::Eq => haystack == needle,
        ComparisonOperator::StartsWith => haystack.starts_with(needle),
        ComparisonOperator::EndsWith => haystack.ends_with(needle),
        ComparisonOperator::Contains => haystack.contains(needle),
        ComparisonOperator::Like => wildcard_match(haystack, needle),
        _ => false,
    }
}

/// Match `pattern` where `*` stands for any run of characters.
fn wildcard_match(haystack: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return haystack == pattern;
    }
    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = haystack.strip_prefix(first) else {
        return false;
    };
    let (last, middle) = match rest.split_last() {
        Some((last, middle)) => (*last, middle),
        None => return true,
    };
    for part in middle {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}
