//! Fragment splitting.
//!
//! A query is cut into fragments at the delimiter of its nesting level (`&` at
//! level 1, `,` below). Parenthesized spans are atomic: a running paren counter
//! suppresses delimiter recognition until the span closes.

use crate::error::{DslError, Result};

pub const TOP_LEVEL_DELIMITER: char = '&';
pub const NESTED_DELIMITER: char = ',';
pub const COMMENT_MARKER: char = '^';

pub fn delimiter_for(level: usize) -> char {
    if level <= 1 { TOP_LEVEL_DELIMITER } else { NESTED_DELIMITER }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    delimiter: char,
}

impl Lexer {
    pub fn new(input: &str, level: usize) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            delimiter: delimiter_for(level),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    /// Next fragment, or `None` once the input is exhausted. Empty fragments are
    /// skipped.
    pub fn next_fragment(&mut self) -> Result<Option<String>> {
        loop {
            if self.current_char().is_none() {
                return Ok(None);
            }

            let start = self.position;
            let mut depth: usize = 0;
            let mut fragment = String::new();

            while let Some(ch) = self.current_char() {
                match ch {
                    '(' => depth += 1,
                    ')' => {
                        if depth == 0 {
                            return Err(DslError::MalformedQuery(format!(
                                "unbalanced ')' at position {}",
                                self.position
                            )));
                        }
                        depth -= 1;
                    }
                    c if c == self.delimiter && depth == 0 => break,
                    _ => {}
                }
                fragment.push(ch);
                self.advance();
            }

            if depth > 0 {
                return Err(DslError::MalformedQuery(format!(
                    "unclosed '(' in fragment starting at position {start}"
                )));
            }

            // Consume the delimiter
            if self.current_char().is_some() {
                self.advance();
            }

            let trimmed = fragment.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    pub fn fragments(mut self) -> Result<Vec<String>> {
        let mut fragments = Vec::new();
        while let Some(fragment) = self.next_fragment()? {
            fragments.push(fragment);
        }
        Ok(fragments)
    }
}

/// Split a comma list (in-lists, array values) at depth 0.
pub fn split_list(body: &str) -> Result<Vec<String>> {
    Lexer::new(body, 2).fragments()
}

/// Split a trailing `^comment` (at paren depth 0) off a fragment.
pub fn split_comment(fragment: &str) -> (&str, Option<String>) {
    let mut depth: i32 = 0;
    let mut marker = None;
    for (i, ch) in fragment.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            COMMENT_MARKER if depth == 0 => marker = Some(i),
            _ => {}
        }
    }
    match marker {
        Some(i) => (
            fragment[..i].trim_end(),
            Some(fragment[i + COMMENT_MARKER.len_utf8()..].to_string()),
        ),
        None => (fragment, None),
    }
}

#[test]
fn test_top_level_split() {
    let fragments = Lexer::new("a=eq.1&or=(b.eq.2,c.in.(x,y))&&d=is.null", 1)
        .fragments()
        .unwrap();
    assert_eq!(fragments, vec!["a=eq.1", "or=(b.eq.2,c.in.(x,y))", "d=is.null"]);
}

#[test]
fn test_nested_split_keeps_parens_atomic() {
    let fragments = Lexer::new("b.eq.2,c.in.(x,y),and(d.eq.1,e.eq.2)", 2)
        .fragments()
        .unwrap();
    assert_eq!(fragments, vec!["b.eq.2", "c.in.(x,y)", "and(d.eq.1,e.eq.2)"]);
}

#[test]
fn test_unbalanced_parens() {
    let err = Lexer::new("a=eq.1)", 1).fragments().unwrap_err();
    assert_eq!(err.code(), "MalformedQuery");
    let err = Lexer::new("or=(a.eq.1", 1).fragments().unwrap_err();
    assert_eq!(err.code(), "MalformedQuery");
}

#[test]
fn test_comment_split() {
    assert_eq!(
        split_comment("name=eq.x^first pass"),
        ("name=eq.x", Some("first pass".to_string()))
    );
    assert_eq!(split_comment("or=(a.eq.1^no)"), ("or=(a.eq.1^no)", None));
}
