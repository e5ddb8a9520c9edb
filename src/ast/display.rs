//! Query-string serialization of tokens.
//!
//! [`Token::to_query_string`] reproduces a token in the surface syntax so that
//! tokenizing the output yields the same token again. [`canonical_query`] goes a
//! step further and orders tokens (and group children) by kind priority, giving
//! one deterministic string for equivalent queries.

use crate::ast::{Cursor, InMode, Paging, SortField, Token};

/// Percent-encode the characters that would otherwise split or end a value.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ',' => out.push_str("%2C"),
            '&' => out.push_str("%26"),
            '(' => out.push_str("%28"),
            ')' => out.push_str("%29"),
            '^' => out.push_str("%5E"),
            other => out.push(other),
        }
    }
    out
}

fn head(field: &str, level: usize) -> String {
    if level <= 1 {
        format!("{field}=")
    } else {
        format!("{field}.")
    }
}

fn not(negated: bool) -> &'static str {
    if negated { "not." } else { "" }
}

fn list(values: &[String]) -> String {
    values.iter().map(|v| escape(v)).collect::<Vec<_>>().join(",")
}

fn render_sort_field(field: &SortField) -> String {
    let mut out = format!("{}.{}", field.field, field.direction.as_str());
    match &field.cursor {
        Some(Cursor::Value(v)) => {
            out.push('.');
            // keep a literal "$null" value apart from the NULL cursor
            if let Some(rest) = v.strip_prefix('$') {
                out.push_str("%24");
                out.push_str(&escape(rest));
            } else {
                out.push_str(&escape(v));
            }
        }
        Some(Cursor::Null) => out.push_str(".$null"),
        Some(Cursor::Empty) => out.push_str(".$empty"),
        None => {}
    }
    out
}

fn render_children(children: &[Token], level: usize, canonical: bool) -> String {
    let mut rendered: Vec<(u8, String)> = children
        .iter()
        .map(|c| (c.kind().priority(), c.render(level, canonical)))
        .collect();
    if canonical {
        rendered.sort();
    }
    rendered
        .into_iter()
        .map(|(_, s)| s)
        .collect::<Vec<_>>()
        .join(",")
}

fn render_paging(paging: &Paging, canonical: bool) -> String {
    let mut parts = Vec::new();
    if let Some(sort) = &paging.sort {
        parts.push(Token::Sort(sort.clone()).render(2, canonical));
    }
    if let Some(limit) = &paging.limit {
        parts.push(Token::Limit(limit.clone()).render(2, canonical));
    }
    if let Some(count) = &paging.show_count {
        parts.push(Token::ShowCount(count.clone()).render(2, canonical));
    }
    format!("paging=({})", parts.join(","))
}

impl Token {
    /// Serialize as a top-level (level 1) fragment.
    pub fn to_query_string(&self) -> String {
        self.render(1, false)
    }

    /// Serialize using the syntax of nesting `level`.
    pub fn to_query_string_at(&self, level: usize) -> String {
        self.render(level, false)
    }

    fn render(&self, level: usize, canonical: bool) -> String {
        let mut out = match self {
            Token::Comparison(c) => format!(
                "{}{}{}.{}",
                head(&c.field, level),
                not(c.negated),
                c.operator.as_str(),
                escape(&c.value)
            ),
            Token::Is(t) => format!(
                "{}is.{}{}",
                head(&t.field, level),
                not(t.negated),
                t.value.as_str()
            ),
            Token::In(t) => {
                let mode = match t.mode {
                    InMode::Eq => String::new(),
                    other => format!("{}.", other.as_str()),
                };
                format!(
                    "{}{}{}in.({})",
                    head(&t.field, level),
                    not(t.negated),
                    mode,
                    list(&t.values)
                )
            }
            Token::DateRange(d) => format!(
                "{}{}{}.{}{}{}{}",
                head(&d.field, level),
                not(d.negated),
                d.operator.as_str(),
                d.amount,
                d.unit.as_char(),
                if d.exact { "e" } else { "" },
                if d.strict { "s" } else { "" }
            ),
            Token::Array(a) => format!(
                "{}.{}{}({})",
                a.field,
                not(a.negated),
                a.mode.as_str(),
                list(&a.values)
            ),
            Token::Group(g) => format!(
                "{}{}{}({})",
                not(g.negated),
                g.operator.as_str(),
                if level <= 1 { "=" } else { "" },
                render_children(&g.children, level + 1, canonical)
            ),
            Token::NestedFilter(n) => format!(
                "{}.with{}({})",
                n.field,
                if level <= 1 { "=" } else { "" },
                render_children(&n.children, level + 1, canonical)
            ),
            Token::Select(s) => format!("select={}", s.fields.join(",")),
            Token::Sort(s) => format!(
                "sort({})",
                s.fields
                    .iter()
                    .map(render_sort_field)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Token::Limit(l) => format!("limit.{}", l.value),
            Token::ShowCount(c) => format!("count.{}", c.value),
            Token::Paging(p) => render_paging(p, canonical),
            Token::MetaInclude(m) => {
                let mut parts = Vec::new();
                if m.filters {
                    parts.push("filters");
                }
                if m.columns {
                    parts.push("columns");
                }
                if m.subscriptions {
                    parts.push("subscriptions");
                }
                format!("metaInclude={}", parts.join(","))
            }
        };
        if let Some(comment) = self.comment() {
            out.push('^');
            out.push_str(&escape(comment));
        }
        out
    }
}

/// Deterministic serialization of a token list, ordered by kind priority.
pub fn canonical_query(tokens: &[Token]) -> String {
    let mut rendered: Vec<(u8, String)> = tokens
        .iter()
        .map(|t| (t.kind().priority(), t.render(1, true)))
        .collect();
    rendered.sort();
    rendered
        .into_iter()
        .map(|(_, s)| s)
        .collect::<Vec<_>>()
        .join("&")
}
