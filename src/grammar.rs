//! Grammar dispatch table.
//!
//! The grammar is a flat, ordered list of `(recognizer, strategy)` rules. A
//! fragment is handed to the first rule whose recognizer matches; the strategy
//! then parses it strictly and reports a kind-specific error on a partial match.
//! Recognizers are written to be mutually exclusive, so the order only matters
//! as a tie-breaker and new token kinds are added by appending a rule.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::ast::{Token, TokenKind};
use crate::error::{DslError, Result};
use crate::parser::{self, Tokenizer};

/// Field name pattern
pub(crate) const FIELD: &str = r"[A-Za-z_][A-Za-z0-9_]*";

/// A regex in two spellings: `{S}` becomes `=` at level 1 and `\.` below.
/// `{F}` expands to the field pattern.
pub(crate) struct Shape {
    top: Regex,
    nested: Regex,
}

impl Shape {
    pub(crate) fn new(pattern: &str) -> Self {
        let build = |separator: &str| regex(&pattern.replace("{F}", FIELD).replace("{S}", separator));
        Shape {
            top: build("="),
            nested: build(r"\."),
        }
    }

    /// Two unrelated spellings for level 1 and deeper levels.
    pub(crate) fn pair(top: &str, nested: &str) -> Self {
        Shape {
            top: regex(top),
            nested: regex(nested),
        }
    }

    pub(crate) fn for_level(&self, level: usize) -> &Regex {
        if level <= 1 { &self.top } else { &self.nested }
    }

    pub(crate) fn is_match(&self, fragment: &str, level: usize) -> bool {
        self.for_level(level).is_match(fragment)
    }
}

pub(crate) fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("grammar pattern must compile")
}

static SORT: Lazy<Regex> = Lazy::new(|| regex(r"^sort\("));
static IN: Lazy<Shape> = Lazy::new(|| Shape::new(r"^{F}{S}(not\.)?((eq|stw|enw|cs)\.)?in\."));
static GROUP: Lazy<Shape> =
    Lazy::new(|| Shape::pair(r"^(not\.)?(and|or)=\(", r"^(not\.)?(and|or)\("));
static LIMIT: Lazy<Regex> = Lazy::new(|| regex(r"^limit\.[^.]*$"));
static SELECT: Lazy<Regex> = Lazy::new(|| regex(r"^select=[^.=]*$"));
static PAGING: Lazy<Regex> = Lazy::new(|| regex(r"^paging=\("));
static COUNT: Lazy<Regex> = Lazy::new(|| regex(r"^count\.[^.]*$"));
static META_INCLUDE: Lazy<Regex> = Lazy::new(|| regex(r"^metaInclude=[^.]*$"));
static DATE_RANGE: Lazy<Shape> = Lazy::new(|| Shape::new(r"^{F}{S}(not\.)?(ago|for)\."));
static COMPARISON: Lazy<Shape> =
    Lazy::new(|| Shape::new(r"^{F}{S}(not\.)?(eq|gte|gt|lte|lt|like|stw|enw|cs)\."));
static IS: Lazy<Shape> = Lazy::new(|| Shape::new(r"^{F}{S}is\."));
static NESTED_FILTER: Lazy<Regex> = Lazy::new(|| regex(&format!(r"^{FIELD}\.with=?\(")));
static ARRAY: Lazy<Regex> = Lazy::new(|| regex(&format!(r"^{FIELD}\.(not\.)?(incl|excl)\(")));

fn recognizes_sort(fragment: &str, level: usize) -> bool {
    level > 1 && SORT.is_match(fragment)
}

fn recognizes_in(fragment: &str, level: usize) -> bool {
    IN.is_match(fragment, level)
}

fn recognizes_group(fragment: &str, level: usize) -> bool {
    GROUP.is_match(fragment, level)
}

fn recognizes_limit(fragment: &str, level: usize) -> bool {
    level > 1 && LIMIT.is_match(fragment)
}

fn recognizes_select(fragment: &str, level: usize) -> bool {
    level == 1 && SELECT.is_match(fragment)
}

fn recognizes_paging(fragment: &str, level: usize) -> bool {
    level == 1 && PAGING.is_match(fragment)
}

fn recognizes_count(fragment: &str, level: usize) -> bool {
    level > 1 && COUNT.is_match(fragment)
}

fn recognizes_meta_include(fragment: &str, level: usize) -> bool {
    level == 1 && META_INCLUDE.is_match(fragment)
}

fn recognizes_date_range(fragment: &str, level: usize) -> bool {
    DATE_RANGE.is_match(fragment, level)
}

// `name=eq.in.(…)` belongs to the in rule.
fn recognizes_comparison(fragment: &str, level: usize) -> bool {
    COMPARISON.is_match(fragment, level) && !IN.is_match(fragment, level)
}

fn recognizes_is(fragment: &str, level: usize) -> bool {
    IS.is_match(fragment, level)
}

fn recognizes_nested_filter(fragment: &str, _level: usize) -> bool {
    NESTED_FILTER.is_match(fragment)
}

fn recognizes_array(fragment: &str, _level: usize) -> bool {
    ARRAY.is_match(fragment)
}

pub type Recognizer = fn(&str, usize) -> bool;
pub type Strategy = fn(&Tokenizer, &str, usize) -> Result<Token>;

pub struct GrammarRule {
    pub kind: TokenKind,
    pub recognizes: Recognizer,
    pub strategy: Strategy,
}

fn rule(kind: TokenKind, recognizes: Recognizer, strategy: Strategy) -> GrammarRule {
    GrammarRule {
        kind,
        recognizes,
        strategy,
    }
}

pub struct Grammar {
    rules: Vec<GrammarRule>,
}

impl Default for Grammar {
    fn default() -> Self {
        Grammar::new()
    }
}

impl Grammar {
    /// The standard rule table, in dispatch priority order.
    pub fn new() -> Self {
        Grammar {
            rules: vec![
                rule(TokenKind::Sort, recognizes_sort, parser::parse_sort),
                rule(TokenKind::In, recognizes_in, parser::parse_in),
                rule(TokenKind::Group, recognizes_group, parser::parse_group),
                rule(TokenKind::Limit, recognizes_limit, parser::parse_limit),
                rule(TokenKind::Select, recognizes_select, parser::parse_select),
                rule(TokenKind::Paging, recognizes_paging, parser::parse_paging),
                rule(TokenKind::ShowCount, recognizes_count, parser::parse_count),
                rule(TokenKind::MetaInclude, recognizes_meta_include, parser::parse_meta_include),
                rule(TokenKind::DateRange, recognizes_date_range, parser::parse_date_range),
                rule(TokenKind::Comparison, recognizes_comparison, parser::parse_comparison),
                rule(TokenKind::Is, recognizes_is, parser::parse_is),
                rule(TokenKind::NestedFilter, recognizes_nested_filter, parser::parse_nested_filter),
                rule(TokenKind::Array, recognizes_array, parser::parse_array),
            ],
        }
    }

    pub fn rules(&self) -> &[GrammarRule] {
        &self.rules
    }

    /// First rule whose recognizer accepts `fragment` at `level`.
    pub fn resolve(&self, fragment: &str, level: usize) -> Result<&GrammarRule> {
        let rule = self
            .rules
            .iter()
            .find(|rule| (rule.recognizes)(fragment, level))
            .ok_or_else(|| DslError::NotSupported(fragment.to_string()))?;
        trace!(target: "sieve::tokenizer", kind = rule.kind.name(), level, "fragment recognized");
        Ok(rule)
    }

    /// Every rule kind accepting `fragment`; more than one entry means the grammar
    /// is ambiguous for that input.
    pub fn matching_kinds(&self, fragment: &str, level: usize) -> Vec<TokenKind> {
        self.rules
            .iter()
            .filter(|rule| (rule.recognizes)(fragment, level))
            .map(|rule| rule.kind)
            .collect()
    }
}
