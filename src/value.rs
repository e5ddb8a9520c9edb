use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::metadata::FieldType;

/// A typed scalar (or array of scalars) used by both compiler backends.
///
/// DSL values arrive as text and are typed against the field's metadata with
/// [`Value::parse`]; in-memory records are typed with [`Value::from_json`]. SQL
/// parameters are emitted as `Value`s so the host driver can bind them natively.
///
/// # Examples
///
/// ```
/// use sieve_query::Value;
/// use sieve_query::metadata::FieldType;
///
/// let v = Value::parse("42", &FieldType::Integer).unwrap();
/// assert_eq!(v, Value::Integer(42));
///
/// assert!(Value::parse("maybe", &FieldType::Boolean).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    /// Exact decimal (money, quantities)
    Decimal(Decimal),
    String(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Uuid(Uuid),
    Array(Vec<Value>),
}

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

impl Value {
    /// Type a raw DSL value for a field. `None` when the text does not fit the type.
    pub fn parse(raw: &str, field_type: &FieldType) -> Option<Value> {
        Some(match field_type {
            FieldType::Text | FieldType::Json | FieldType::JsonArray => Value::String(raw.to_string()),
            FieldType::Integer => Value::Integer(raw.parse().ok()?),
            FieldType::Decimal => Value::Decimal(Decimal::from_str(raw).ok()?),
            FieldType::Boolean => match raw {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return None,
            },
            FieldType::Timestamp => Value::Timestamp(parse_timestamp(raw)?),
            FieldType::Date => Value::Date(parse_timestamp(raw)?.date()),
            FieldType::Uuid => Value::Uuid(Uuid::parse_str(raw).ok()?),
            FieldType::Array(element) => return Value::parse(raw, element),
        })
    }

    /// Type a JSON record value for a field. Values that do not fit become `Null`.
    pub fn from_json(json: &JsonValue, field_type: &FieldType) -> Value {
        match (json, field_type) {
            (JsonValue::Null, _) => Value::Null,
            (JsonValue::Array(items), FieldType::Array(element)) => {
                Value::Array(items.iter().map(|i| Value::from_json(i, element)).collect())
            }
            (JsonValue::Array(items), FieldType::JsonArray) => {
                Value::Array(items.iter().map(|i| Value::from_json(i, &FieldType::Text)).collect())
            }
            (JsonValue::String(s), t) => Value::parse(s, t).unwrap_or(Value::Null),
            (JsonValue::Bool(b), FieldType::Boolean) => Value::Boolean(*b),
            (JsonValue::Bool(b), FieldType::Text) => Value::String(b.to_string()),
            (JsonValue::Number(n), FieldType::Integer) => {
                n.as_i64().map(Value::Integer).unwrap_or(Value::Null)
            }
            (JsonValue::Number(n), FieldType::Decimal) => Decimal::from_str(&n.to_string())
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64))
                .map(Value::Decimal)
                .unwrap_or(Value::Null),
            (JsonValue::Number(n), FieldType::Text) => Value::String(n.to_string()),
            _ => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering between two values of compatible types; `None` otherwise.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (Value::Decimal(a), Value::Integer(b)) => Some(a.cmp(&Decimal::from(*b))),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Date(b)) => Some(a.date().cmp(b)),
            (Value::Date(a), Value::Timestamp(b)) => Some(a.cmp(&b.date())),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Truncate timestamps to their calendar date.
    pub fn to_date(&self) -> Value {
        match self {
            Value::Timestamp(ts) => Value::Date(ts.date()),
            other => other.clone(),
        }
    }

    /// Minimum value substituted for NULL when ordering and comparing cursors.
    pub fn sentinel(field_type: &FieldType) -> Value {
        match field_type {
            FieldType::Integer => Value::Integer(-1),
            FieldType::Decimal => Value::Decimal(Decimal::NEGATIVE_ONE),
            FieldType::Boolean => Value::Boolean(false),
            FieldType::Timestamp => Value::Timestamp(NaiveDateTime::MIN),
            FieldType::Date => Value::Date(NaiveDate::MIN),
            FieldType::Uuid => Value::Uuid(Uuid::nil()),
            _ => Value::String(String::new()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::Number((*i).into()),
            Value::Decimal(d) => JsonValue::String(d.to_string()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Timestamp(ts) => JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Uuid(_) => "uuid",
            Value::Array(_) => "array",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_timestamps_in_several_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        for raw in ["2024-03-01T10:30:00", "2024-03-01 10:30:00", "2024-03-01T10:30:00Z"] {
            assert_eq!(Value::parse(raw, &FieldType::Timestamp), Some(Value::Timestamp(expected)));
        }
        assert_eq!(
            Value::parse("2024-03-01", &FieldType::Date),
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
    }

    #[test]
    fn json_numbers_become_decimals() {
        let v = Value::from_json(&json!(12.5), &FieldType::Decimal);
        assert_eq!(v, Value::Decimal(Decimal::new(125, 1)));
        assert_eq!(
            Value::Integer(12).compare(&Value::Decimal(Decimal::new(125, 1))),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn mismatched_json_is_null() {
        assert_eq!(Value::from_json(&json!("abc"), &FieldType::Integer), Value::Null);
        assert_eq!(Value::from_json(&json!(true), &FieldType::Integer), Value::Null);
    }
}
