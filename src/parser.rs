//! Tokenizer and the per-kind parsing strategies.
//!
//! The [`Tokenizer`] cuts a query into fragments with the [`Lexer`], asks the
//! [`Grammar`] which strategy owns each fragment and hands it over. Strategies
//! that contain a parenthesized body (groups, paging, nested filters) call back
//! into the tokenizer one level deeper.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::ast::{
    ArrayMode, ArrayOperation, Comparison, ComparisonOperator, Cursor, DateRange,
    DateRangeOperator, DateUnit, Group, InMode, InToken, IsToken, IsValue, KEY_PLACEHOLDER,
    Limit, MetaInclude, NestedFilter, NestingOperator, Paging, Select, ShowCount, Sort,
    SortDirection, SortField, Token,
};
use crate::config::EngineConfig;
use crate::error::{DslError, Result};
use crate::grammar::{FIELD, Grammar, Shape, regex};
use crate::lexer::{Lexer, split_comment, split_list};

pub struct Tokenizer {
    grammar: Grammar,
    max_depth: usize,
}

impl Tokenizer {
    pub fn new(max_depth: usize) -> Self {
        Tokenizer {
            grammar: Grammar::new(),
            max_depth,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Tokenizer::new(config.max_nesting_depth)
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Tokenize a complete query. Values are percent-decoded after splitting,
    /// so an encoded delimiter (`%2C`, `%26`, `%28`, `%29`, `%5E`) stays literal.
    pub fn tokenize(&self, query: &str) -> Result<Vec<Token>> {
        let tokens = self.tokenize_level(query.trim(), 1)?;
        debug!(target: "sieve::tokenizer", count = tokens.len(), "query tokenized");
        Ok(tokens)
    }

    /// Tokenize `query` as the body of a construct at `level`.
    pub fn tokenize_level(&self, query: &str, level: usize) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(query, level);
        let mut tokens = Vec::new();
        while let Some(fragment) = lexer.next_fragment()? {
            let (body, comment) = split_comment(&fragment);
            let rule = self.grammar.resolve(body, level)?;
            let token = (rule.strategy)(self, body, level)?;
            let comment = comment.as_deref().map(decode).transpose()?;
            tokens.push(token.with_comment(comment));
        }
        Ok(tokens)
    }

    /// Recurse into a parenthesized body one level below `level`.
    fn descend(&self, body: &str, level: usize) -> Result<Vec<Token>> {
        let child_level = level + 1;
        if child_level > self.max_depth {
            return Err(DslError::ExceededNesting {
                max: self.max_depth,
            });
        }
        self.tokenize_level(body, child_level)
    }
}

static COMPARISON: Lazy<Shape> =
    Lazy::new(|| Shape::new(r"^(?P<field>{F}){S}(?P<not>not\.)?(?P<op>[a-z]+)\.(?P<value>.*)$"));
static IN: Lazy<Shape> = Lazy::new(|| {
    Shape::new(r"^(?P<field>{F}){S}(?P<not>not\.)?(?:(?P<mode>[a-z]+)\.)?in\.\((?P<values>.*)\)$")
});
static GROUP: Lazy<Shape> = Lazy::new(|| {
    Shape::pair(
        r"^(?P<not>not\.)?(?P<op>and|or)=\((?P<body>.*)\)$",
        r"^(?P<not>not\.)?(?P<op>and|or)\((?P<body>.*)\)$",
    )
});
static DATE_RANGE: Lazy<Shape> = Lazy::new(|| {
    Shape::new(
        r"^(?P<field>{F}){S}(?P<not>not\.)?(?P<op>ago|for)\.(?P<amount>\d+)(?P<unit>[dwmy])(?P<exact>e)?(?P<strict>s)?$",
    )
});
static IS: Lazy<Shape> =
    Lazy::new(|| Shape::new(r"^(?P<field>{F}){S}is\.(?P<not>not\.)?(?P<value>[^.]+)$"));
static NESTED_FILTER: Lazy<Regex> =
    Lazy::new(|| regex(&format!(r"^(?P<field>{FIELD})\.with=?\((?P<body>.*)\)$")));
static ARRAY: Lazy<Regex> = Lazy::new(|| {
    regex(&format!(
        r"^(?P<field>{FIELD})\.(?P<not>not\.)?(?P<mode>incl|excl)\((?P<values>.*)\)$"
    ))
});
static SELECT_FIELD: Lazy<Regex> = Lazy::new(|| regex(&format!(r"^{FIELD}$")));
static PAGING: Lazy<Regex> = Lazy::new(|| regex(r"^paging=\((?P<body>.*)\)$"));
static SORT: Lazy<Regex> = Lazy::new(|| regex(r"^sort\((?P<body>.*)\)$"));
static SORT_ITEM: Lazy<Regex> = Lazy::new(|| {
    regex(&format!(
        r"^(?P<field>\$key|{FIELD})\.(?P<dir>asc|desc)(?:\.(?P<cursor>.+))?$"
    ))
});
static LIMIT: Lazy<Regex> = Lazy::new(|| regex(r"^limit\.(?P<value>\d+)$"));
static COUNT: Lazy<Regex> = Lazy::new(|| regex(r"^count\.(?P<value>true|false)$"));

fn text<'a>(caps: &Captures<'a>, name: &str) -> &'a str {
    caps.name(name).map_or("", |m| m.as_str())
}

fn flag(caps: &Captures<'_>, name: &str) -> bool {
    caps.name(name).is_some()
}

fn decode(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|v| v.into_owned())
        .map_err(|e| DslError::MalformedQuery(format!("invalid percent-encoding in '{raw}': {e}")))
}

/// Split a value list at literal commas, then decode each item.
fn decoded_list(body: &str) -> Result<Vec<String>> {
    split_list(body)?.iter().map(|v| decode(v)).collect()
}

pub(crate) fn parse_comparison(_: &Tokenizer, fragment: &str, level: usize) -> Result<Token> {
    let caps = COMPARISON
        .for_level(level)
        .captures(fragment)
        .ok_or_else(|| DslError::InvalidComparison(fragment.to_string()))?;
    let operator = ComparisonOperator::parse(text(&caps, "op"))
        .ok_or_else(|| DslError::InvalidComparison(fragment.to_string()))?;

    Ok(Token::Comparison(
        Comparison::new(text(&caps, "field"), operator, decode(text(&caps, "value"))?)
            .negate(flag(&caps, "not"))
            .at_level(level),
    ))
}

pub(crate) fn parse_in(_: &Tokenizer, fragment: &str, level: usize) -> Result<Token> {
    let invalid = || DslError::InvalidIn(fragment.to_string());
    let caps = IN.for_level(level).captures(fragment).ok_or_else(invalid)?;
    let mode = match caps.name("mode") {
        Some(m) => InMode::parse(m.as_str()).ok_or_else(invalid)?,
        None => InMode::Eq,
    };
    let values = decoded_list(text(&caps, "values")).map_err(|_| invalid())?;
    if values.is_empty() {
        return Err(invalid());
    }

    Ok(Token::In(InToken::new(
        text(&caps, "field"),
        values,
        mode,
        flag(&caps, "not"),
    )))
}

/// Filter children of a group or nested filter; anything else is `reject`ed.
fn filter_children(
    tokenizer: &Tokenizer,
    body: &str,
    level: usize,
    reject: impl Fn(String) -> DslError,
) -> Result<Vec<Token>> {
    let children = tokenizer.descend(body, level)?;
    if children.is_empty() {
        return Err(reject("empty body".to_string()));
    }
    if let Some(child) = children.iter().find(|c| !c.kind().is_filter()) {
        return Err(reject(format!(
            "'{}' cannot appear inside a filter body",
            child.kind().name()
        )));
    }
    Ok(children)
}

pub(crate) fn parse_group(tokenizer: &Tokenizer, fragment: &str, level: usize) -> Result<Token> {
    let caps = GROUP
        .for_level(level)
        .captures(fragment)
        .ok_or_else(|| DslError::InvalidGroup(fragment.to_string()))?;
    let operator = if text(&caps, "op") == "and" {
        NestingOperator::And
    } else {
        NestingOperator::Or
    };
    let children = filter_children(tokenizer, text(&caps, "body"), level, DslError::InvalidGroup)?;

    Ok(Token::Group(Group::new(
        operator,
        children,
        flag(&caps, "not"),
        level,
    )))
}

pub(crate) fn parse_date_range(_: &Tokenizer, fragment: &str, level: usize) -> Result<Token> {
    let invalid = || DslError::InvalidDateRange(fragment.to_string());
    let caps = DATE_RANGE.for_level(level).captures(fragment).ok_or_else(invalid)?;
    let operator = if text(&caps, "op") == "ago" {
        DateRangeOperator::Ago
    } else {
        DateRangeOperator::For
    };
    let amount: u32 = text(&caps, "amount").parse().map_err(|_| invalid())?;
    let unit = text(&caps, "unit")
        .chars()
        .next()
        .and_then(DateUnit::parse)
        .ok_or_else(invalid)?;

    let mut range = DateRange::new(text(&caps, "field"), operator, amount, unit);
    range.exact = flag(&caps, "exact");
    range.strict = flag(&caps, "strict");
    range.negated = flag(&caps, "not");
    Ok(Token::DateRange(range))
}

pub(crate) fn parse_is(_: &Tokenizer, fragment: &str, level: usize) -> Result<Token> {
    let invalid = || DslError::InvalidIsToken(fragment.to_string());
    let caps = IS.for_level(level).captures(fragment).ok_or_else(invalid)?;
    let value = IsValue::parse(text(&caps, "value")).ok_or_else(invalid)?;

    Ok(Token::Is(IsToken::new(
        text(&caps, "field"),
        value,
        flag(&caps, "not"),
    )))
}

pub(crate) fn parse_nested_filter(
    tokenizer: &Tokenizer,
    fragment: &str,
    level: usize,
) -> Result<Token> {
    let caps = NESTED_FILTER
        .captures(fragment)
        .ok_or_else(|| DslError::InvalidNestedFilter(fragment.to_string()))?;
    let children = filter_children(
        tokenizer,
        text(&caps, "body"),
        level,
        DslError::InvalidNestedFilter,
    )?;

    Ok(Token::NestedFilter(NestedFilter::new(
        text(&caps, "field"),
        children,
    )))
}

pub(crate) fn parse_array(_: &Tokenizer, fragment: &str, _level: usize) -> Result<Token> {
    let invalid = || DslError::InvalidArrayOperation(fragment.to_string());
    let caps = ARRAY.captures(fragment).ok_or_else(invalid)?;
    let mode = if text(&caps, "mode") == "incl" {
        ArrayMode::Include
    } else {
        ArrayMode::Exclude
    };
    let values = decoded_list(text(&caps, "values")).map_err(|_| invalid())?;
    if values.is_empty() {
        return Err(invalid());
    }

    Ok(Token::Array(ArrayOperation::new(
        text(&caps, "field"),
        values,
        mode,
        flag(&caps, "not"),
    )))
}

pub(crate) fn parse_select(_: &Tokenizer, fragment: &str, _level: usize) -> Result<Token> {
    let invalid = || DslError::InvalidSelect(fragment.to_string());
    let list = fragment.strip_prefix("select=").ok_or_else(invalid)?;
    let mut fields: Vec<String> = Vec::new();
    for field in list.split(',').map(str::trim) {
        if field != "*" && !SELECT_FIELD.is_match(field) {
            return Err(invalid());
        }
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }
    if fields.is_empty() || (fields.len() > 1 && fields.iter().any(|f| f == "*")) {
        return Err(invalid());
    }
    Ok(Token::Select(Select::new(fields)))
}

pub(crate) fn parse_paging(tokenizer: &Tokenizer, fragment: &str, level: usize) -> Result<Token> {
    let invalid = DslError::InvalidPaging;
    let caps = PAGING
        .captures(fragment)
        .ok_or_else(|| invalid(fragment.to_string()))?;
    let children = tokenizer.descend(text(&caps, "body"), level)?;
    if children.is_empty() {
        return Err(invalid("empty paging body".to_string()));
    }

    let mut paging = Paging::default();
    for child in children {
        let kind = child.kind().name();
        let duplicate = match child {
            Token::Sort(sort) => paging.sort.replace(sort).is_some(),
            Token::Limit(limit) => paging.limit.replace(limit).is_some(),
            Token::ShowCount(count) => paging.show_count.replace(count).is_some(),
            _ => return Err(invalid(format!("'{kind}' cannot appear inside paging"))),
        };
        if duplicate {
            return Err(invalid(format!("'{kind}' appears more than once")));
        }
    }
    Ok(Token::Paging(paging))
}

pub(crate) fn parse_sort(_: &Tokenizer, fragment: &str, _level: usize) -> Result<Token> {
    let invalid = DslError::InvalidSort;
    let caps = SORT
        .captures(fragment)
        .ok_or_else(|| invalid(fragment.to_string()))?;
    let items = split_list(text(&caps, "body")).map_err(|e| invalid(e.to_string()))?;
    if items.is_empty() {
        return Err(invalid("no sort expressions".to_string()));
    }

    let mut fields: Vec<SortField> = Vec::with_capacity(items.len());
    for item in &items {
        let caps = SORT_ITEM
            .captures(item)
            .ok_or_else(|| invalid(item.clone()))?;
        let name = text(&caps, "field");
        if fields.iter().any(|f| f.field == name) {
            return Err(invalid(format!("'{name}' is sorted twice")));
        }
        let direction = SortDirection::parse(text(&caps, "dir")).unwrap_or_default();
        let mut field = SortField::new(name, direction);
        if let Some(cursor) = caps.name("cursor") {
            let cursor = match Cursor::parse(cursor.as_str()) {
                Cursor::Value(raw) => Cursor::Value(decode(&raw)?),
                literal => literal,
            };
            field = field.with_cursor(cursor);
        }
        fields.push(field);
    }

    check_sort(&fields)?;
    Ok(Token::Sort(Sort::new(fields)))
}

/// `$key` may only close the list, and cursors are all-or-nothing and
/// must end on `$key`.
pub(crate) fn check_sort(fields: &[SortField]) -> Result<()> {
    let last = fields.len().saturating_sub(1);
    if let Some(pos) = fields.iter().position(SortField::is_key_placeholder)
        && pos != last
    {
        return Err(DslError::InvalidSort(format!(
            "'{KEY_PLACEHOLDER}' must be the last sort expression"
        )));
    }

    let with_cursor = fields.iter().filter(|f| f.cursor.is_some()).count();
    if with_cursor == 0 {
        return Ok(());
    }
    if with_cursor != fields.len() {
        return Err(DslError::InvalidSort(
            "every sort expression needs a cursor value once one has it".to_string(),
        ));
    }
    if !fields.last().is_some_and(SortField::is_key_placeholder) {
        return Err(DslError::InvalidSort(format!(
            "a cursor must end on '{KEY_PLACEHOLDER}'"
        )));
    }
    Ok(())
}

pub(crate) fn parse_limit(_: &Tokenizer, fragment: &str, _level: usize) -> Result<Token> {
    let invalid = || DslError::InvalidLimit(fragment.to_string());
    let caps = LIMIT.captures(fragment).ok_or_else(invalid)?;
    let value: u64 = text(&caps, "value").parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }
    Ok(Token::Limit(Limit::new(value)))
}

pub(crate) fn parse_count(_: &Tokenizer, fragment: &str, _level: usize) -> Result<Token> {
    let caps = COUNT
        .captures(fragment)
        .ok_or_else(|| DslError::InvalidShowCount(fragment.to_string()))?;
    Ok(Token::ShowCount(ShowCount::new(text(&caps, "value") == "true")))
}

pub(crate) fn parse_meta_include(_: &Tokenizer, fragment: &str, _level: usize) -> Result<Token> {
    let invalid = || DslError::InvalidMetaInclude(fragment.to_string());
    let list = fragment.strip_prefix("metaInclude=").ok_or_else(invalid)?;

    let mut meta = MetaInclude::default();
    for item in list.split(',').map(str::trim) {
        match item {
            "filters" => meta.filters = true,
            "columns" => meta.columns = true,
            "subscriptions" => meta.subscriptions = true,
            _ => return Err(invalid()),
        }
    }
    Ok(Token::MetaInclude(meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TokenKind;

    fn tokenize(query: &str) -> Result<Vec<Token>> {
        Tokenizer::new(5).tokenize(query)
    }

    fn single(query: &str) -> Token {
        let mut tokens = tokenize(query).unwrap();
        assert_eq!(tokens.len(), 1, "{query} -> {tokens:?}");
        tokens.remove(0)
    }

    #[test]
    fn test_comparison() {
        let Token::Comparison(c) = single("amount=not.gte.10") else {
            panic!("expected comparison")
        };
        assert_eq!(c.field, "amount");
        assert_eq!(c.operator, ComparisonOperator::Gte);
        assert_eq!(c.value, "10");
        assert!(c.negated);
        assert_eq!(c.nesting_level, 1);
    }

    #[test]
    fn test_comparison_value_may_contain_dots() {
        let Token::Comparison(c) = single("email=eq.a.b@example.com") else {
            panic!("expected comparison")
        };
        assert_eq!(c.value, "a.b@example.com");
    }

    #[test]
    fn test_in_with_mode() {
        let Token::In(token) = single("name=not.stw.in.(a,b)") else {
            panic!("expected in")
        };
        assert_eq!(token.mode, InMode::StartsWith);
        assert_eq!(token.values, vec!["a", "b"]);
        assert!(token.negated);
        assert_eq!(tokenize("name=in.()").unwrap_err().code(), "InvalidIn");
    }

    #[test]
    fn test_group_children_are_one_level_deeper() {
        let Token::Group(group) = single("not.or=(a.eq.1,and(b.gt.2,c.is.null))") else {
            panic!("expected group")
        };
        assert!(group.negated);
        assert_eq!(group.nesting_level, 1);
        assert_eq!(group.operator, NestingOperator::Or);
        let Token::Group(inner) = &group.children[1] else {
            panic!("expected inner group")
        };
        assert_eq!(inner.nesting_level, 2);
        let Token::Comparison(c) = &inner.children[0] else {
            panic!("expected comparison")
        };
        assert_eq!(c.nesting_level, 3);
    }

    #[test]
    fn test_group_rejects_paging_children() {
        let err = tokenize("and=(a.eq.1,limit.5)").unwrap_err();
        assert_eq!(err.code(), "InvalidGroup");
        assert_eq!(tokenize("and=()").unwrap_err().code(), "InvalidGroup");
    }

    #[test]
    fn test_date_range_flags() {
        let Token::DateRange(range) = single("due=not.for.3mes") else {
            panic!("expected date range")
        };
        assert_eq!(range.operator, DateRangeOperator::For);
        assert_eq!((range.amount, range.unit), (3, DateUnit::Month));
        assert!(range.exact && range.strict && range.negated);
        assert_eq!(tokenize("due=ago.3q").unwrap_err().code(), "InvalidDateRange");
    }

    #[test]
    fn test_is_values() {
        let Token::Is(token) = single("notes=is.not.$empty") else {
            panic!("expected is")
        };
        assert!(token.is_empty_query() && token.negated);
        assert_eq!(tokenize("notes=is.maybe").unwrap_err().code(), "InvalidIsToken");
    }

    #[test]
    fn test_nested_filter_binds_scope() {
        let Token::NestedFilter(nested) = single("address.with=(city.eq.Paris,or(zip.stw.75,zip.is.null))")
        else {
            panic!("expected nested filter")
        };
        assert_eq!(nested.field, "address");
        assert_eq!(nested.children[0].json_path(), ["address".to_string()]);
        let Token::Group(group) = &nested.children[1] else {
            panic!("expected group")
        };
        assert_eq!(group.children[1].json_path(), ["address".to_string()]);
    }

    #[test]
    fn test_array() {
        let Token::Array(array) = single("tags.not.excl(red,blue)") else {
            panic!("expected array")
        };
        assert_eq!(array.mode, ArrayMode::Exclude);
        assert!(array.negated);
        assert_eq!(array.values, vec!["red", "blue"]);
    }

    #[test]
    fn test_select() {
        let Token::Select(select) = single("select=id,name,id") else {
            panic!("expected select")
        };
        assert_eq!(select.fields, vec!["id", "name"]);
        assert!(matches!(single("select=*"), Token::Select(s) if s.is_all()));
        assert_eq!(tokenize("select=*,id").unwrap_err().code(), "InvalidSelect");
    }

    #[test]
    fn test_paging() {
        let Token::Paging(paging) =
            single("paging=(sort(name.asc,$key.desc),limit.20,count.true)")
        else {
            panic!("expected paging")
        };
        let sort = paging.sort.unwrap();
        assert_eq!(sort.fields.len(), 2);
        assert_eq!(sort.fields[1].direction, SortDirection::Desc);
        assert_eq!(paging.limit.unwrap().value, 20);
        assert!(paging.show_count.unwrap().value);
    }

    #[test]
    fn test_paging_rejects_duplicates_and_filters() {
        assert_eq!(
            tokenize("paging=(limit.1,limit.2)").unwrap_err().code(),
            "InvalidPaging"
        );
        assert_eq!(
            tokenize("paging=(a.eq.1)").unwrap_err().code(),
            "InvalidPaging"
        );
        assert_eq!(tokenize("paging=(limit.0)").unwrap_err().code(), "InvalidLimit");
        assert_eq!(
            tokenize("paging=(count.maybe)").unwrap_err().code(),
            "InvalidShowCount"
        );
    }

    #[test]
    fn test_sort_cursor_rules() {
        let Token::Paging(paging) =
            single("paging=(sort(category.asc.books,$key.asc.$null))")
        else {
            panic!("expected paging")
        };
        let sort = paging.sort.unwrap();
        assert_eq!(sort.fields[0].cursor, Some(Cursor::Value("books".to_string())));
        assert_eq!(sort.fields[1].cursor, Some(Cursor::Null));

        for bad in [
            "paging=(sort(category.asc.books))",
            "paging=(sort(category.asc.books,$key.asc))",
            "paging=(sort($key.asc,name.desc))",
            "paging=(sort(name.asc,name.desc))",
            "paging=(sort(name.up))",
        ] {
            assert_eq!(tokenize(bad).unwrap_err().code(), "InvalidSort", "{bad}");
        }
    }

    #[test]
    fn test_meta_include() {
        let Token::MetaInclude(meta) = single("metaInclude=filters,columns") else {
            panic!("expected metaInclude")
        };
        assert!(meta.filters && meta.columns && !meta.subscriptions);
        assert_eq!(
            tokenize("metaInclude=everything").unwrap_err().code(),
            "InvalidMetaInclude"
        );
    }

    #[test]
    fn test_comments_are_attached() {
        let token = single("name=eq.x^look here");
        assert_eq!(token.comment(), Some("look here"));
    }

    #[test]
    fn test_percent_decoding() {
        let Token::Comparison(c) = single("name=eq.a%20b%2Cc") else {
            panic!("expected comparison")
        };
        assert_eq!(c.value, "a b,c");
    }

    #[test]
    fn test_unsupported_fragment() {
        assert_eq!(tokenize("name~foo").unwrap_err().code(), "NotSupported");
        assert_eq!(tokenize("limit.5").unwrap_err().code(), "NotSupported");
    }

    #[test]
    fn test_nesting_limit() {
        let tokenizer = Tokenizer::new(2);
        assert!(tokenizer.tokenize("or=(a.eq.1,b.eq.2)").is_ok());
        let err = tokenizer.tokenize("or=(a.eq.1,and(b.eq.2,c.eq.3))").unwrap_err();
        assert_eq!(err, DslError::ExceededNesting { max: 2 });
    }

    #[test]
    fn test_every_kind_is_reachable() {
        let kinds: Vec<TokenKind> = tokenize(
            "select=id&a=eq.1&b=ago.1d&c=is.null&d=in.(x)&e.incl(y)&f.with=(g.eq.1)&or=(h.eq.1)&paging=(limit.1)&metaInclude=filters",
        )
        .unwrap()
        .iter()
        .map(Token::kind)
        .collect();
        assert_eq!(kinds.len(), 10);
    }
}
