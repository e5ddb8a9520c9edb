//! In-memory backend.
//!
//! Compiles a [`TokenizedQuery`] into a [`MemoryQuery`]: a boxed predicate over
//! JSON records plus the sort, keyset, limit and projection steps that run
//! after it. Records are JSON objects keyed by field name.
//!
//! Semantics follow the SQL backend exactly so both agree on any fixture:
//! text matching is case-insensitive (and accent-insensitive for normalized
//! fields), a negated test also holds for NULL on nullable fields, NULLs sort
//! as the type's sentinel minimum, and a JSON-array nested filter sees one NULL
//! element when the array is empty.

use std::cmp::Ordering;

use chrono::{NaiveDateTime, Weekday};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::ast::{
    ArrayMode, ArrayOperation, Comparison, ComparisonOperator, Cursor, DateRange, Group, InToken,
    IsToken, IsValue, NestedFilter, NestingOperator, Select, Sort, SortDirection, Token,
};
use crate::config::EngineConfig;
use crate::daterange;
use crate::error::{DslError, Result};
use crate::metadata::{EntityMetadata, FieldMetadata, FieldType};
use crate::normalize::{in_mode_operator, normalize_text, text_matches};
use crate::service::TokenizedQuery;
use crate::value::Value;

/// Boolean test over one record.
pub type Predicate = Box<dyn Fn(&JsonValue) -> bool + Send + Sync>;

/// Test over one field value; `None` is NULL or missing.
type FieldTest = Box<dyn Fn(Option<&JsonValue>) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    /// Reference instant for relative date ranges
    pub now: NaiveDateTime,
    pub week_start: Weekday,
}

impl EvalOptions {
    pub fn new(now: NaiveDateTime) -> Self {
        EvalOptions {
            now,
            week_start: Weekday::Mon,
        }
    }

    pub fn from_config(config: &EngineConfig, now: NaiveDateTime) -> Self {
        EvalOptions {
            now,
            week_start: config.week_start,
        }
    }
}

fn field_value<'r>(record: &'r JsonValue, name: &str) -> Option<&'r JsonValue> {
    record.get(name).filter(|v| !v.is_null())
}

fn fold(normalize: bool, s: &str) -> String {
    if normalize {
        normalize_text(s)
    } else {
        s.to_lowercase()
    }
}

fn text_of(json: &JsonValue) -> Option<String> {
    match Value::from_json(json, &FieldType::Text) {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn satisfies(operator: ComparisonOperator, ordering: Ordering) -> bool {
    match operator {
        ComparisonOperator::Eq => ordering == Ordering::Equal,
        ComparisonOperator::Gt => ordering == Ordering::Greater,
        ComparisonOperator::Gte => ordering != Ordering::Less,
        ComparisonOperator::Lt => ordering == Ordering::Less,
        ComparisonOperator::Lte => ordering != Ordering::Greater,
        _ => false,
    }
}

/// Timestamps compare by calendar date outside of date ranges.
fn truncated(value: Value, field_type: &FieldType) -> Value {
    if *field_type == FieldType::Timestamp {
        value.to_date()
    } else {
        value
    }
}

fn comparable(json: &JsonValue, field_type: &FieldType) -> Value {
    truncated(Value::from_json(json, field_type), field_type)
}

/// Non-null test that, when negated, also accepts NULL on nullable fields.
fn negatable(
    name: String,
    nullable: bool,
    negated: bool,
    test: impl Fn(&JsonValue) -> bool + Send + Sync + 'static,
) -> Predicate {
    Box::new(move |record: &JsonValue| match field_value(record, &name) {
        None => negated && nullable,
        Some(value) => test(value) != negated,
    })
}

/// Test that sees NULL itself; negation is plain inversion.
fn inverted(name: String, negated: bool, test: FieldTest) -> Predicate {
    Box::new(move |record: &JsonValue| test(field_value(record, &name)) != negated)
}

struct SortKey {
    name: String,
    field_type: FieldType,
    nullable: bool,
    direction: SortDirection,
    cursor: Option<Value>,
}

impl SortKey {
    fn key(&self, record: &JsonValue) -> Value {
        match record.get(&self.name).map(|v| Value::from_json(v, &self.field_type)) {
            Some(value) if !value.is_null() => value,
            _ if self.nullable => Value::sentinel(&self.field_type),
            _ => Value::Null,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = a.compare(b).unwrap_or(Ordering::Equal);
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// A compiled in-memory query.
pub struct MemoryQuery {
    predicate: Predicate,
    sort: Vec<SortKey>,
    limit: Option<usize>,
    projection: Vec<String>,
    show_count: bool,
    fetch_rows: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryResult {
    pub items: Vec<JsonValue>,
    /// Matches before keyset and limit, when a count was requested
    pub total_count: Option<usize>,
}

impl MemoryQuery {
    pub fn matches(&self, record: &JsonValue) -> bool {
        (self.predicate)(record)
    }

    /// Strictly after the cursor tuple in sort order.
    fn resumes_after_cursor(&self, record: &JsonValue) -> bool {
        if self.sort.is_empty() || self.sort.iter().any(|k| k.cursor.is_none()) {
            return true;
        }
        for key in &self.sort {
            let Some(cursor) = &key.cursor else {
                return true;
            };
            match key.compare(&key.key(record), cursor) {
                Ordering::Equal => continue,
                Ordering::Greater => return true,
                Ordering::Less => return false,
            }
        }
        false
    }

    fn project(&self, record: &JsonValue) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .projection
            .iter()
            .map(|name| (name.clone(), record.get(name).cloned().unwrap_or(JsonValue::Null)))
            .collect();
        JsonValue::Object(map)
    }

    pub fn run(&self, records: &[JsonValue]) -> MemoryResult {
        let mut matched: Vec<&JsonValue> = records.iter().filter(|r| self.matches(r)).collect();
        let total_count = self.show_count.then_some(matched.len());
        if !self.fetch_rows {
            return MemoryResult {
                items: Vec::new(),
                total_count,
            };
        }

        if !self.sort.is_empty() {
            matched.sort_by(|a, b| {
                self.sort
                    .iter()
                    .map(|key| key.compare(&key.key(a), &key.key(b)))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }
        let items: Vec<JsonValue> = matched
            .into_iter()
            .filter(|r| self.resumes_after_cursor(r))
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|r| self.project(r))
            .collect();

        debug!(
            target: "sieve::memory",
            records = records.len(),
            returned = items.len(),
            "in-memory query evaluated"
        );
        MemoryResult { items, total_count }
    }
}

pub struct PredicateCompiler<'a> {
    metadata: &'a dyn EntityMetadata,
    options: EvalOptions,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(metadata: &'a dyn EntityMetadata, options: EvalOptions) -> Self {
        PredicateCompiler { metadata, options }
    }

    pub fn compile(&self, query: &TokenizedQuery) -> Result<MemoryQuery> {
        let sort = match query.sort() {
            Some(sort) => self.sort_keys(sort)?,
            None => Vec::new(),
        };
        Ok(MemoryQuery {
            predicate: self.predicate(&query.tokens)?,
            sort,
            limit: query.limit().map(|l| usize::try_from(l).unwrap_or(usize::MAX)),
            projection: self.projection(query.select())?,
            show_count: query.show_count() || query.is_count_only,
            fetch_rows: query.fetches_rows(),
        })
    }

    /// AND of every filter token in `tokens`.
    pub fn predicate(&self, tokens: &[Token]) -> Result<Predicate> {
        self.all_of(tokens.iter().filter(|t| t.kind().is_filter()), self.metadata.fields())
    }

    fn all_of<'t>(
        &self,
        tokens: impl Iterator<Item = &'t Token>,
        fields: &[FieldMetadata],
    ) -> Result<Predicate> {
        let parts = tokens
            .map(|t| self.filter(t, fields))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(move |record: &JsonValue| parts.iter().all(|p| p(record))))
    }

    fn lookup<'f>(&self, fields: &'f [FieldMetadata], name: &str) -> Result<&'f FieldMetadata> {
        fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| DslError::TokenFieldInvalid {
                entity: self.metadata.entity_name().to_string(),
                field: name.to_string(),
                capability: "filterable",
            })
    }

    fn filter(&self, token: &Token, fields: &[FieldMetadata]) -> Result<Predicate> {
        match token {
            Token::Comparison(c) => self.comparison(self.lookup(fields, &c.field)?, c),
            Token::Is(t) => Ok(self.is(self.lookup(fields, &t.field)?, t)),
            Token::In(t) => self.membership(self.lookup(fields, &t.field)?, t),
            Token::DateRange(t) => self.date_range(self.lookup(fields, &t.field)?, t),
            Token::Array(t) => self.array(self.lookup(fields, &t.field)?, t),
            Token::Group(group) => self.group(group, fields),
            Token::NestedFilter(nested) => self.nested(nested, self.lookup(fields, &nested.field)?),
            other => Err(DslError::NotSupported(other.to_query_string())),
        }
    }

    fn comparison(&self, field: &FieldMetadata, c: &Comparison) -> Result<Predicate> {
        let field_type = field.field_type.clone();
        let operator = c.operator;

        if field_type.is_text() {
            if operator.is_range() {
                let expected = c.value.clone();
                return Ok(negatable(field.name.clone(), field.nullable, c.negated, move |v| {
                    text_of(v).is_some_and(|s| satisfies(operator, s.as_str().cmp(&expected)))
                }));
            }
            let normalize = field.normalize;
            let needle = fold(normalize, &c.value);
            return Ok(negatable(field.name.clone(), field.nullable, c.negated, move |v| {
                text_of(v).is_some_and(|s| text_matches(operator, &fold(normalize, &s), &needle))
            }));
        }

        if operator.is_pattern() || field_type.is_json() || field_type.is_collection() {
            return Err(DslError::unsupported(&c.field, operator.as_str(), &field_type));
        }
        let expected = Value::parse(&c.value, &field_type).ok_or_else(|| {
            DslError::InvalidComparison(format!("'{}' is not a valid {field_type}", c.value))
        })?;
        let expected = truncated(expected, &field_type);
        Ok(negatable(field.name.clone(), field.nullable, c.negated, move |v| {
            comparable(v, &field_type)
                .compare(&expected)
                .is_some_and(|o| satisfies(operator, o))
        }))
    }

    fn is(&self, field: &FieldMetadata, t: &IsToken) -> Predicate {
        let test: FieldTest = match t.value {
            IsValue::Null => Box::new(|v: Option<&JsonValue>| v.is_none()),
            IsValue::True | IsValue::False => {
                let expected = Value::Boolean(t.value == IsValue::True);
                Box::new(move |v: Option<&JsonValue>| {
                    v.is_some_and(|v| Value::from_json(v, &FieldType::Boolean) == expected)
                })
            }
            IsValue::Empty if field.field_type.is_collection() => {
                Box::new(|v: Option<&JsonValue>| v.and_then(JsonValue::as_array).is_none_or(Vec::is_empty))
            }
            IsValue::Empty => {
                Box::new(|v: Option<&JsonValue>| v.and_then(text_of).is_none_or(|s| s.is_empty()))
            }
        };
        inverted(field.name.clone(), t.negated, test)
    }

    fn membership(&self, field: &FieldMetadata, t: &InToken) -> Result<Predicate> {
        let field_type = field.field_type.clone();
        if field_type.is_text() {
            let normalize = field.normalize;
            let operator = in_mode_operator(t.mode);
            let needles: Vec<String> = t.values.iter().map(|v| fold(normalize, v)).collect();
            return Ok(negatable(field.name.clone(), field.nullable, t.negated, move |v| {
                text_of(v).is_some_and(|s| {
                    let hay = fold(normalize, &s);
                    needles.iter().any(|n| text_matches(operator, &hay, n))
                })
            }));
        }

        let expected = t
            .values
            .iter()
            .map(|raw| {
                Value::parse(raw, &field_type)
                    .map(|v| truncated(v, &field_type))
                    .ok_or_else(|| DslError::InvalidIn(format!("'{raw}' is not a valid {field_type}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(negatable(field.name.clone(), field.nullable, t.negated, move |v| {
            let actual = comparable(v, &field_type);
            expected
                .iter()
                .any(|e| actual.compare(e) == Some(Ordering::Equal))
        }))
    }

    fn date_range(&self, field: &FieldMetadata, t: &DateRange) -> Result<Predicate> {
        let field_type = field.field_type.clone();
        if !field_type.is_temporal() {
            return Err(DslError::unsupported(&t.field, t.operator.as_str(), &field_type));
        }
        let (start, end) = daterange::resolve_token(t, self.options.now, self.options.week_start);
        let (start, end) = match field_type {
            FieldType::Date => (Value::Date(start.date()), Value::Date(end.date())),
            _ => (Value::Timestamp(start), Value::Timestamp(end)),
        };
        Ok(negatable(field.name.clone(), field.nullable, t.negated, move |v| {
            let actual = Value::from_json(v, &field_type);
            actual.compare(&start).is_some_and(|o| o != Ordering::Less)
                && actual.compare(&end).is_some_and(|o| o != Ordering::Greater)
        }))
    }

    fn array(&self, field: &FieldMetadata, t: &ArrayOperation) -> Result<Predicate> {
        let Some(element) = field.field_type.element_type().cloned() else {
            return Err(DslError::unsupported(&t.field, t.mode.as_str(), &field.field_type));
        };
        let wanted = t
            .values
            .iter()
            .map(|raw| {
                Value::parse(raw, &element).ok_or_else(|| {
                    DslError::InvalidArrayOperation(format!("'{raw}' is not a valid {element}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mode = t.mode;

        let test: FieldTest = Box::new(move |v: Option<&JsonValue>| {
            let items: Vec<Value> = v
                .and_then(JsonValue::as_array)
                .map(|items| items.iter().map(|i| Value::from_json(i, &element)).collect())
                .unwrap_or_default();
            let present = |w: &Value| items.contains(w);
            match mode {
                ArrayMode::Include => v.is_some() && wanted.iter().all(present),
                ArrayMode::Exclude => !wanted.iter().any(present),
            }
        });
        Ok(inverted(field.name.clone(), t.negated, test))
    }

    fn group(&self, group: &Group, fields: &[FieldMetadata]) -> Result<Predicate> {
        let parts = group
            .children
            .iter()
            .map(|child| self.filter(child, fields))
            .collect::<Result<Vec<_>>>()?;
        let operator = group.operator;
        let negated = group.negated;
        Ok(Box::new(move |record: &JsonValue| {
            let result = match operator {
                NestingOperator::And => parts.iter().all(|p| p(record)),
                NestingOperator::Or => parts.iter().any(|p| p(record)),
            };
            result != negated
        }))
    }

    fn nested(&self, nested: &NestedFilter, field: &FieldMetadata) -> Result<Predicate> {
        let inner = self.all_of(nested.children.iter(), &field.fields)?;
        let name = field.name.clone();
        match &field.field_type {
            FieldType::Json => Ok(Box::new(move |record: &JsonValue| {
                inner(record.get(&name).unwrap_or(&JsonValue::Null))
            })),
            FieldType::JsonArray => Ok(Box::new(move |record: &JsonValue| {
                match record.get(&name).and_then(JsonValue::as_array) {
                    Some(items) if !items.is_empty() => items.iter().any(|item| inner(item)),
                    _ => inner(&JsonValue::Null),
                }
            })),
            other => Err(DslError::unsupported(&nested.field, "with", other)),
        }
    }

    fn sort_keys(&self, sort: &Sort) -> Result<Vec<SortKey>> {
        sort.fields
            .iter()
            .map(|item| {
                let name = if item.is_key_placeholder() {
                    self.metadata.key_field()
                } else {
                    item.field.as_str()
                };
                let field = self
                    .metadata
                    .field(&[], name)
                    .ok_or_else(|| DslError::ColumnNotSortable(name.to_string()))?;
                let cursor = match &item.cursor {
                    None => None,
                    Some(Cursor::Empty) if field.field_type.is_text() => {
                        Some(Value::String(String::new()))
                    }
                    Some(Cursor::Null | Cursor::Empty) => Some(Value::sentinel(&field.field_type)),
                    Some(Cursor::Value(raw)) => {
                        Some(Value::parse(raw, &field.field_type).ok_or_else(|| {
                            DslError::InvalidSort(format!(
                                "cursor '{raw}' is not a valid {} for '{name}'",
                                field.field_type
                            ))
                        })?)
                    }
                };
                Ok(SortKey {
                    name: field.name.clone(),
                    field_type: field.field_type.clone(),
                    nullable: field.nullable,
                    direction: item.direction,
                    cursor,
                })
            })
            .collect()
    }

    fn projection(&self, select: Option<&Select>) -> Result<Vec<String>> {
        match select {
            Some(select) if !select.is_all() => select
                .fields
                .iter()
                .map(|name| match self.metadata.field(&[], name) {
                    Some(field) => Ok(field.name.clone()),
                    None => Err(DslError::TokenFieldInvalid {
                        entity: self.metadata.entity_name().to_string(),
                        field: name.clone(),
                        capability: "selectable",
                    }),
                })
                .collect(),
            _ => Ok(self
                .metadata
                .fields()
                .iter()
                .filter(|f| f.selectable)
                .map(|f| f.name.clone())
                .collect()),
        }
    }
}
