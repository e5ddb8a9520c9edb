//! Token walk for the SQL backend.

use chrono::{NaiveDateTime, Weekday};
use tracing::debug;

use crate::ast::{
    ArrayMode, ArrayOperation, Comparison, DateRange, Group, InToken, IsToken, IsValue,
    NestedFilter, NestingOperator, Select, Token,
};
use crate::config::{DatabaseDialect, EngineConfig};
use crate::daterange;
use crate::error::{DslError, Result};
use crate::metadata::{EntityMetadata, FieldMetadata, FieldType};
use crate::normalize::{like_pattern, normalize_text};
use crate::service::TokenizedQuery;
use crate::sql::dialect::comparison_lexeme;
use crate::sql::keyset;
use crate::sql::{Parameters, SqlDialect, SqlStatement, dialect_for};
use crate::value::Value;

/// Per-call settings.
#[derive(Debug, Clone, Copy)]
pub struct SqlOptions {
    /// Reference instant for relative date ranges
    pub now: NaiveDateTime,
    pub week_start: Weekday,
    /// Wrap the row query so it returns a single JSON array
    pub json_aggregate: bool,
}

impl SqlOptions {
    pub fn new(now: NaiveDateTime) -> Self {
        SqlOptions {
            now,
            week_start: Weekday::Mon,
            json_aggregate: false,
        }
    }

    pub fn from_config(config: &EngineConfig, now: NaiveDateTime) -> Self {
        SqlOptions {
            week_start: config.week_start,
            ..SqlOptions::new(now)
        }
    }

    pub fn json_aggregate(mut self, enabled: bool) -> Self {
        self.json_aggregate = enabled;
        self
    }
}

/// Fields visible at one point of the walk: table columns, or the members of
/// an embedded JSON object reached through `base`.
struct Scope<'a> {
    fields: &'a [FieldMetadata],
    base: Option<String>,
    depth: usize,
}

struct Column<'a> {
    field: &'a FieldMetadata,
    expr: String,
    /// Reached through JSON access rather than a table column
    in_json: bool,
}

impl Column<'_> {
    fn field_type(&self) -> &FieldType {
        &self.field.field_type
    }
}

pub struct SqlCompiler<'a> {
    dialect: &'static dyn SqlDialect,
    metadata: &'a dyn EntityMetadata,
    options: SqlOptions,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(dialect: DatabaseDialect, metadata: &'a dyn EntityMetadata, options: SqlOptions) -> Self {
        SqlCompiler {
            dialect: dialect_for(dialect),
            metadata,
            options,
        }
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    /// Row query: projection, filters, keyset continuation, order and limit.
    pub fn rows(&self, query: &TokenizedQuery) -> Result<SqlStatement> {
        let mut params = Parameters::default();
        let mut conditions = Vec::new();
        if let Some(filters) = self.where_clause(&query.tokens, &mut params)? {
            conditions.push(filters);
        }

        let columns = match query.sort() {
            Some(sort) => keyset::sort_columns(self.dialect, self.metadata, sort)?,
            None => Vec::new(),
        };
        if let Some(resume) = keyset::continuation(self.dialect, &mut params, &columns)? {
            conditions.push(resume);
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            self.projection(query.select())?,
            self.metadata.source()
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if !columns.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&keyset::order_by(self.dialect, &columns));
        }
        if let Some(limit) = query.limit() {
            let param = params.bind(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            sql.push(' ');
            sql.push_str(&self.dialect.limit(&param, !columns.is_empty()));
        }
        if self.options.json_aggregate {
            sql = self.dialect.json_aggregate(&sql);
        }

        debug!(
            target: "sieve::sql",
            dialect = ?self.dialect.kind(),
            params = params.len(),
            %sql,
            "row statement compiled"
        );
        Ok(SqlStatement { sql, params })
    }

    /// Total count over the filters, ignoring paging.
    pub fn count(&self, query: &TokenizedQuery) -> Result<SqlStatement> {
        let mut params = Parameters::default();
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.metadata.source());
        if let Some(filters) = self.where_clause(&query.tokens, &mut params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&filters);
        }
        debug!(target: "sieve::sql", dialect = ?self.dialect.kind(), %sql, "count statement compiled");
        Ok(SqlStatement { sql, params })
    }

    /// AND of every filter token in `tokens`, or `None` when there is none.
    pub fn where_clause(&self, tokens: &[Token], params: &mut Parameters) -> Result<Option<String>> {
        let scope = Scope {
            fields: self.metadata.fields(),
            base: None,
            depth: 0,
        };
        let parts = tokens
            .iter()
            .filter(|t| t.kind().is_filter())
            .map(|t| self.filter(t, &scope, params))
            .collect::<Result<Vec<_>>>()?;
        Ok((!parts.is_empty()).then(|| parts.join(" AND ")))
    }

    fn projection(&self, select: Option<&Select>) -> Result<String> {
        let fields: Vec<&FieldMetadata> = match select {
            Some(select) if !select.is_all() => select
                .fields
                .iter()
                .map(|name| {
                    self.metadata
                        .field(&[], name)
                        .ok_or_else(|| DslError::TokenFieldInvalid {
                            entity: self.metadata.entity_name().to_string(),
                            field: name.clone(),
                            capability: "selectable",
                        })
                })
                .collect::<Result<_>>()?,
            _ => self.metadata.fields().iter().filter(|f| f.selectable).collect(),
        };
        if fields.is_empty() {
            return Ok("*".to_string());
        }
        Ok(fields
            .iter()
            .map(|f| {
                format!(
                    "{} AS {}",
                    self.dialect.quote(f.column_name()),
                    self.dialect.quote(&f.name)
                )
            })
            .collect::<Vec<_>>()
            .join(", "))
    }

    fn column(&self, scope: &Scope<'a>, name: &str) -> Result<Column<'a>> {
        let field = scope
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| DslError::TokenFieldInvalid {
                entity: self.metadata.entity_name().to_string(),
                field: name.to_string(),
                capability: "filterable",
            })?;
        Ok(match &scope.base {
            None => Column {
                field,
                expr: self.dialect.quote(field.column_name()),
                in_json: false,
            },
            Some(base) => {
                let key = field.column_name();
                let expr = if field.field_type.is_json() || field.field_type.is_collection() {
                    self.dialect.json_child(base, key)
                } else {
                    self.dialect.json_scalar(base, key, &field.field_type)
                };
                Column {
                    field,
                    expr,
                    in_json: true,
                }
            }
        })
    }

    fn filter(&self, token: &Token, scope: &Scope<'a>, params: &mut Parameters) -> Result<String> {
        match token {
            Token::Comparison(c) => self.comparison(&self.column(scope, &c.field)?, c, params),
            Token::Is(t) => self.is(&self.column(scope, &t.field)?, t),
            Token::In(t) => self.membership(&self.column(scope, &t.field)?, t, params),
            Token::DateRange(t) => self.date_range(&self.column(scope, &t.field)?, t, params),
            Token::Array(t) => self.array(&self.column(scope, &t.field)?, t, params),
            Token::Group(group) => self.group(group, scope, params),
            Token::NestedFilter(nested) => self.nested(nested, scope, params),
            other => Err(DslError::NotSupported(other.to_query_string())),
        }
    }

    /// A negated test must also hold for NULL.
    fn or_null(&self, column: &Column<'_>, condition: String, negated: bool) -> String {
        if negated && column.field.nullable {
            format!("({condition} OR {} IS NULL)", column.expr)
        } else {
            condition
        }
    }

    fn fold_value(&self, field: &FieldMetadata, value: &str) -> String {
        if field.normalize {
            normalize_text(value)
        } else {
            value.to_lowercase()
        }
    }

    fn match_expr(&self, column: &Column<'_>) -> String {
        if column.field.normalize {
            self.dialect.fold_accents(&column.expr)
        } else {
            column.expr.clone()
        }
    }

    /// Expression and value as compared: timestamps drop to their date.
    fn comparable(&self, column: &Column<'_>, value: Value) -> (String, Value) {
        match column.field_type() {
            FieldType::Timestamp => (self.dialect.to_date(&column.expr), value.to_date()),
            _ => (column.expr.clone(), value),
        }
    }

    fn comparison(&self, column: &Column<'_>, c: &Comparison, params: &mut Parameters) -> Result<String> {
        let field_type = column.field_type();
        if field_type.is_text() {
            if c.operator.is_range() {
                let param = params.bind(Value::String(c.value.clone()));
                let condition = format!(
                    "{} {} {param}",
                    column.expr,
                    comparison_lexeme(c.operator, c.negated)
                );
                return Ok(self.or_null(column, condition, c.negated));
            }
            let pattern = like_pattern(c.operator, &self.fold_value(column.field, &c.value));
            let param = params.bind(Value::String(pattern));
            let condition = self
                .dialect
                .text_match(&self.match_expr(column), &param, c.negated);
            return Ok(self.or_null(column, condition, c.negated));
        }

        if c.operator.is_pattern() || field_type.is_json() || field_type.is_collection() {
            return Err(DslError::unsupported(&c.field, c.operator.as_str(), field_type));
        }
        let value = Value::parse(&c.value, field_type).ok_or_else(|| {
            DslError::InvalidComparison(format!("'{}' is not a valid {field_type}", c.value))
        })?;
        let (expr, value) = self.comparable(column, value);
        let param = params.bind(value);
        let condition = format!("{expr} {} {param}", comparison_lexeme(c.operator, c.negated));
        Ok(self.or_null(column, condition, c.negated))
    }

    fn is(&self, column: &Column<'_>, t: &IsToken) -> Result<String> {
        let expr = &column.expr;
        let field_type = column.field_type();
        Ok(match t.value {
            IsValue::Null if t.negated => format!("{expr} IS NOT NULL"),
            IsValue::Null => format!("{expr} IS NULL"),
            IsValue::True => self.dialect.boolean_test(expr, true, t.negated),
            IsValue::False => self.dialect.boolean_test(expr, false, t.negated),
            IsValue::Empty if field_type.is_collection() => {
                let length = self
                    .dialect
                    .collection_length(expr, self.native_array(column));
                if t.negated {
                    format!("{length} > 0")
                } else {
                    format!("{length} = 0")
                }
            }
            // NOT (NULL OR '') is NOT NULL AND <> ''
            IsValue::Empty if t.negated => format!("({expr} IS NOT NULL AND {expr} <> '')"),
            IsValue::Empty => format!("({expr} IS NULL OR {expr} = '')"),
        })
    }

    fn membership(&self, column: &Column<'_>, t: &InToken, params: &mut Parameters) -> Result<String> {
        let field_type = column.field_type();
        if field_type.is_text() {
            let values: Vec<String> = t
                .values
                .iter()
                .map(|v| self.fold_value(column.field, v))
                .collect();
            let condition =
                self.dialect
                    .text_in(params, &self.match_expr(column), &values, t.mode, t.negated);
            return Ok(self.or_null(column, condition, t.negated));
        }

        let mut expr = column.expr.clone();
        let mut names = Vec::with_capacity(t.values.len());
        for raw in &t.values {
            let value = Value::parse(raw, field_type)
                .ok_or_else(|| DslError::InvalidIn(format!("'{raw}' is not a valid {field_type}")))?;
            let (compared, value) = self.comparable(column, value);
            expr = compared;
            names.push(params.bind(value));
        }
        let not = if t.negated { "NOT " } else { "" };
        let condition = format!("{expr} {not}IN ({})", names.join(", "));
        Ok(self.or_null(column, condition, t.negated))
    }

    fn date_range(&self, column: &Column<'_>, t: &DateRange, params: &mut Parameters) -> Result<String> {
        let field_type = column.field_type();
        if !field_type.is_temporal() {
            return Err(DslError::unsupported(&t.field, t.operator.as_str(), field_type));
        }
        let (start, end) = daterange::resolve_token(t, self.options.now, self.options.week_start);
        let (start, end) = match field_type {
            FieldType::Date => (Value::Date(start.date()), Value::Date(end.date())),
            _ => (Value::Timestamp(start), Value::Timestamp(end)),
        };
        let start = params.bind(start);
        let end = params.bind(end);
        let not = if t.negated { "NOT " } else { "" };
        let condition = format!("{} {not}BETWEEN {start} AND {end}", column.expr);
        Ok(self.or_null(column, condition, t.negated))
    }

    fn native_array(&self, column: &Column<'_>) -> bool {
        !column.in_json
            && self.dialect.native_arrays()
            && matches!(column.field_type(), FieldType::Array(_))
    }

    fn array(&self, column: &Column<'_>, t: &ArrayOperation, params: &mut Parameters) -> Result<String> {
        let Some(element) = column.field_type().element_type() else {
            return Err(DslError::unsupported(&t.field, t.mode.as_str(), column.field_type()));
        };
        let mut values = Vec::with_capacity(t.values.len());
        for raw in &t.values {
            let value = Value::parse(raw, element).ok_or_else(|| {
                DslError::InvalidArrayOperation(format!("'{raw}' is not a valid {element}"))
            })?;
            values.push(value);
        }
        let expr = &column.expr;

        if self.native_array(column) {
            let names: Vec<String> = values.into_iter().map(|v| params.bind(v)).collect();
            let literal = self.dialect.array_literal(&names, element);
            // Native arrays only exist on Postgres: @> contains, && overlaps.
            return Ok(match (t.mode, t.negated) {
                (ArrayMode::Include, false) => format!("{expr} @> {literal}"),
                (ArrayMode::Include, true) => format!("(NOT ({expr} @> {literal}) OR {expr} IS NULL)"),
                (ArrayMode::Exclude, false) => format!("(NOT ({expr} && {literal}) OR {expr} IS NULL)"),
                (ArrayMode::Exclude, true) => format!("{expr} && {literal}"),
            });
        }

        let tests: Vec<String> = t
            .values
            .iter()
            .map(|raw| {
                let param = params.bind(Value::String(raw.clone()));
                self.dialect.json_array_has(expr, &param)
            })
            .collect();
        let all_present = format!("({})", tests.join(" AND "));
        let none_present = format!(
            "({})",
            tests
                .iter()
                .map(|test| format!("NOT {test}"))
                .collect::<Vec<_>>()
                .join(" AND ")
        );
        Ok(match (t.mode, t.negated) {
            (ArrayMode::Include, false) => all_present,
            (ArrayMode::Include, true) => format!("NOT {all_present}"),
            (ArrayMode::Exclude, false) => none_present,
            (ArrayMode::Exclude, true) => format!("NOT {none_present}"),
        })
    }

    fn group(&self, group: &Group, scope: &Scope<'a>, params: &mut Parameters) -> Result<String> {
        let joiner = match group.operator {
            NestingOperator::And => " AND ",
            NestingOperator::Or => " OR ",
        };
        let parts = group
            .children
            .iter()
            .map(|child| self.filter(child, scope, params))
            .collect::<Result<Vec<_>>>()?;
        let body = format!("({})", parts.join(joiner));
        // A NULL body counts as false before negation.
        Ok(if group.negated {
            format!("NOT {}", self.dialect.known(&body))
        } else {
            body
        })
    }

    fn nested(&self, nested: &NestedFilter, scope: &Scope<'a>, params: &mut Parameters) -> Result<String> {
        let column = self.column(scope, &nested.field)?;
        let compile_children = |inner: &Scope<'a>, params: &mut Parameters| {
            nested
                .children
                .iter()
                .map(|child| self.filter(child, inner, params))
                .collect::<Result<Vec<_>>>()
                .map(|parts| parts.join(" AND "))
        };

        match column.field_type() {
            FieldType::Json => {
                let inner = Scope {
                    fields: &column.field.fields,
                    base: Some(column.expr.clone()),
                    depth: scope.depth,
                };
                Ok(format!("({})", compile_children(&inner, params)?))
            }
            FieldType::JsonArray => {
                let alias = format!("elem{}", scope.depth + 1);
                let inner = Scope {
                    fields: &column.field.fields,
                    base: Some(self.dialect.element_value(&alias)),
                    depth: scope.depth + 1,
                };
                let condition = compile_children(&inner, params)?;
                Ok(format!(
                    "EXISTS (SELECT 1 FROM {} WHERE {condition})",
                    self.dialect.json_elements(&column.expr, &alias)
                ))
            }
            other => Err(DslError::unsupported(&nested.field, "with", other)),
        }
    }
}
