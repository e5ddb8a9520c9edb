//! Dialect lexemes.
//!
//! The compiler walks tokens the same way for every database and asks the
//! dialect for anything spelled differently: identifier quoting, the
//! case-insensitive match operator, JSON access, array tests, paging.

use crate::ast::{ComparisonOperator, InMode, SortDirection};
use crate::config::DatabaseDialect;
use crate::metadata::FieldType;
use crate::normalize::{in_mode_operator, like_pattern};
use crate::sql::Parameters;
use crate::value::Value;

pub trait SqlDialect: Send + Sync {
    fn kind(&self) -> DatabaseDialect;

    fn quote(&self, ident: &str) -> String;

    /// Storage type used in casts.
    fn type_name(&self, field_type: &FieldType) -> &'static str;

    /// Accent-insensitive view of a text expression.
    fn fold_accents(&self, expr: &str) -> String;

    /// Case-insensitive `LIKE` test against an already lowered pattern.
    fn text_match(&self, expr: &str, param: &str, negated: bool) -> String;

    /// Case-insensitive membership test; `values` are already lowered.
    fn text_in(
        &self,
        params: &mut Parameters,
        expr: &str,
        values: &[String],
        mode: InMode,
        negated: bool,
    ) -> String;

    fn to_date(&self, expr: &str) -> String;

    fn boolean_test(&self, expr: &str, value: bool, negated: bool) -> String;

    /// `condition` with NULL read as false, so `NOT` over it keeps rows whose
    /// condition is unknown.
    fn known(&self, condition: &str) -> String;

    /// Literal standing in for NULL when ordering.
    fn sentinel(&self, field_type: &FieldType) -> String;

    /// Scalar member `key` of the JSON object `base`, cast to `field_type`.
    fn json_scalar(&self, base: &str, key: &str, field_type: &FieldType) -> String;

    /// Object or array member `key` of the JSON object `base`.
    fn json_child(&self, base: &str, key: &str) -> String;

    /// Element count of a collection, 0 for NULL.
    fn collection_length(&self, expr: &str, native: bool) -> String;

    /// Whether array columns are native arrays rather than JSON text.
    fn native_arrays(&self) -> bool;

    /// Native array literal over bound parameters.
    fn array_literal(&self, params: &[String], element: &FieldType) -> String;

    /// The JSON array `expr` holds an element equal to `param`.
    fn json_array_has(&self, expr: &str, param: &str) -> String;

    /// Derived table `alias(value)` over the elements of the JSON array
    /// `expr`, with one NULL row when the array is empty or NULL.
    fn json_elements(&self, expr: &str, alias: &str) -> String;

    /// Value column of a [`json_elements`](SqlDialect::json_elements) table.
    fn element_value(&self, alias: &str) -> String;

    /// Null placement suffix for ORDER BY.
    fn nulls_order(&self, direction: SortDirection) -> &'static str;

    /// Row cap clause for a query with or without an ORDER BY.
    fn limit(&self, param: &str, has_order_by: bool) -> String;

    fn json_aggregate(&self, query: &str) -> String;
}

pub struct Postgres;

pub struct SqlServer;

static POSTGRES: Postgres = Postgres;
static SQL_SERVER: SqlServer = SqlServer;

pub fn dialect_for(kind: DatabaseDialect) -> &'static dyn SqlDialect {
    match kind {
        DatabaseDialect::Postgres => &POSTGRES,
        DatabaseDialect::SqlServer => &SQL_SERVER,
    }
}

fn bind_all(params: &mut Parameters, values: impl Iterator<Item = String>) -> Vec<String> {
    values.map(|v| params.bind(Value::String(v))).collect()
}

impl SqlDialect for Postgres {
    fn kind(&self) -> DatabaseDialect {
        DatabaseDialect::Postgres
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn type_name(&self, field_type: &FieldType) -> &'static str {
        match field_type {
            FieldType::Integer => "bigint",
            FieldType::Decimal => "numeric",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Date => "date",
            FieldType::Uuid => "uuid",
            FieldType::Json | FieldType::JsonArray => "jsonb",
            FieldType::Text | FieldType::Array(_) => "text",
        }
    }

    fn fold_accents(&self, expr: &str) -> String {
        format!("unaccent({expr})")
    }

    fn text_match(&self, expr: &str, param: &str, negated: bool) -> String {
        let op = if negated { "NOT ILIKE" } else { "ILIKE" };
        format!("{expr} {op} {param}")
    }

    fn text_in(
        &self,
        params: &mut Parameters,
        expr: &str,
        values: &[String],
        mode: InMode,
        negated: bool,
    ) -> String {
        let operator = in_mode_operator(mode);
        let names = bind_all(params, values.iter().map(|v| like_pattern(operator, v)));
        if negated {
            format!("{expr} NOT ILIKE ALL(ARRAY[{}])", names.join(", "))
        } else {
            format!("{expr} ILIKE ANY(ARRAY[{}])", names.join(", "))
        }
    }

    fn to_date(&self, expr: &str) -> String {
        format!("({expr})::date")
    }

    fn boolean_test(&self, expr: &str, value: bool, negated: bool) -> String {
        let not = if negated { "NOT " } else { "" };
        let value = if value { "TRUE" } else { "FALSE" };
        format!("{expr} IS {not}{value}")
    }

    fn known(&self, condition: &str) -> String {
        format!("COALESCE({condition}, FALSE)")
    }

    fn sentinel(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Integer | FieldType::Decimal => "-1".to_string(),
            FieldType::Boolean => "FALSE".to_string(),
            FieldType::Timestamp => "'0001-01-01 00:00:00'::timestamp".to_string(),
            FieldType::Date => "'0001-01-01'::date".to_string(),
            FieldType::Uuid => "'00000000-0000-0000-0000-000000000000'::uuid".to_string(),
            _ => "''".to_string(),
        }
    }

    fn json_scalar(&self, base: &str, key: &str, field_type: &FieldType) -> String {
        let text = format!("{base}->>'{key}'");
        match field_type {
            FieldType::Text => text,
            other => format!("({text})::{}", self.type_name(other)),
        }
    }

    fn json_child(&self, base: &str, key: &str) -> String {
        format!("{base}->'{key}'")
    }

    fn collection_length(&self, expr: &str, native: bool) -> String {
        if native {
            format!("COALESCE(cardinality({expr}), 0)")
        } else {
            format!("COALESCE(jsonb_array_length({expr}), 0)")
        }
    }

    fn native_arrays(&self) -> bool {
        true
    }

    fn array_literal(&self, params: &[String], element: &FieldType) -> String {
        format!("ARRAY[{}]::{}[]", params.join(", "), self.type_name(element))
    }

    fn json_array_has(&self, expr: &str, param: &str) -> String {
        format!("EXISTS (SELECT 1 FROM jsonb_array_elements_text({expr}) AS e(v) WHERE e.v = {param})")
    }

    fn json_elements(&self, expr: &str, alias: &str) -> String {
        format!(
            "(SELECT value FROM jsonb_array_elements({expr}) \
             UNION ALL SELECT NULL::jsonb WHERE COALESCE(jsonb_array_length({expr}), 0) = 0) AS {alias}(value)"
        )
    }

    fn element_value(&self, alias: &str) -> String {
        format!("{alias}.value")
    }

    fn nulls_order(&self, direction: SortDirection) -> &'static str {
        match direction {
            SortDirection::Asc => " NULLS FIRST",
            SortDirection::Desc => " NULLS LAST",
        }
    }

    fn limit(&self, param: &str, _has_order_by: bool) -> String {
        format!("LIMIT {param}")
    }

    fn json_aggregate(&self, query: &str) -> String {
        format!("SELECT COALESCE(json_agg(items), '[]') FROM ({query}) items")
    }
}

impl SqlDialect for SqlServer {
    fn kind(&self) -> DatabaseDialect {
        DatabaseDialect::SqlServer
    }

    fn quote(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn type_name(&self, field_type: &FieldType) -> &'static str {
        match field_type {
            FieldType::Integer => "bigint",
            FieldType::Decimal => "decimal(38, 10)",
            FieldType::Boolean => "bit",
            FieldType::Timestamp => "datetime2",
            FieldType::Date => "date",
            FieldType::Uuid => "uniqueidentifier",
            _ => "nvarchar(max)",
        }
    }

    fn fold_accents(&self, expr: &str) -> String {
        format!("{expr} COLLATE Latin1_General_CI_AI")
    }

    fn text_match(&self, expr: &str, param: &str, negated: bool) -> String {
        let op = if negated { "NOT LIKE" } else { "LIKE" };
        format!("{expr} {op} {param} ESCAPE '\\'")
    }

    fn text_in(
        &self,
        params: &mut Parameters,
        expr: &str,
        values: &[String],
        mode: InMode,
        negated: bool,
    ) -> String {
        if mode == InMode::Eq {
            let names = bind_all(params, values.iter().cloned());
            let not = if negated { "NOT " } else { "" };
            return format!("LOWER({expr}) {not}IN ({})", names.join(", "));
        }
        let operator = in_mode_operator(mode);
        let names = bind_all(params, values.iter().map(|v| like_pattern(operator, v)));
        let any = names
            .iter()
            .map(|name| self.text_match(expr, name, false))
            .collect::<Vec<_>>()
            .join(" OR ");
        if negated { format!("NOT ({any})") } else { format!("({any})") }
    }

    fn to_date(&self, expr: &str) -> String {
        format!("CAST({expr} AS date)")
    }

    fn boolean_test(&self, expr: &str, value: bool, negated: bool) -> String {
        let bit = u8::from(value);
        if negated {
            format!("({expr} <> {bit} OR {expr} IS NULL)")
        } else {
            format!("{expr} = {bit}")
        }
    }

    fn known(&self, condition: &str) -> String {
        format!("(CASE WHEN {condition} THEN 1 ELSE 0 END = 1)")
    }

    fn sentinel(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Integer | FieldType::Decimal => "-1".to_string(),
            FieldType::Boolean => "0".to_string(),
            FieldType::Timestamp => "CAST('0001-01-01' AS datetime2)".to_string(),
            FieldType::Date => "CAST('0001-01-01' AS date)".to_string(),
            FieldType::Uuid => {
                "CAST('00000000-0000-0000-0000-000000000000' AS uniqueidentifier)".to_string()
            }
            _ => "N''".to_string(),
        }
    }

    fn json_scalar(&self, base: &str, key: &str, field_type: &FieldType) -> String {
        let text = format!("JSON_VALUE({base}, '$.{key}')");
        match field_type {
            FieldType::Text => text,
            other => format!("CAST({text} AS {})", self.type_name(other)),
        }
    }

    fn json_child(&self, base: &str, key: &str) -> String {
        format!("JSON_QUERY({base}, '$.{key}')")
    }

    fn collection_length(&self, expr: &str, _native: bool) -> String {
        format!("(SELECT COUNT(*) FROM OPENJSON({expr}))")
    }

    fn native_arrays(&self) -> bool {
        false
    }

    fn array_literal(&self, params: &[String], _element: &FieldType) -> String {
        params.join(", ")
    }

    fn json_array_has(&self, expr: &str, param: &str) -> String {
        format!("EXISTS (SELECT 1 FROM OPENJSON({expr}) WHERE [value] = {param})")
    }

    fn json_elements(&self, expr: &str, alias: &str) -> String {
        format!(
            "(SELECT [value] FROM OPENJSON({expr}) \
             UNION ALL SELECT NULL WHERE NOT EXISTS (SELECT 1 FROM OPENJSON({expr}))) AS {alias}([value])"
        )
    }

    fn element_value(&self, alias: &str) -> String {
        format!("{alias}.[value]")
    }

    fn nulls_order(&self, _direction: SortDirection) -> &'static str {
        ""
    }

    fn limit(&self, param: &str, has_order_by: bool) -> String {
        let fetch = format!("OFFSET 0 ROWS FETCH NEXT {param} ROWS ONLY");
        if has_order_by {
            fetch
        } else {
            format!("ORDER BY (SELECT NULL) {fetch}")
        }
    }

    fn json_aggregate(&self, query: &str) -> String {
        format!("SELECT COALESCE(({query} FOR JSON PATH, INCLUDE_NULL_VALUES), '[]')")
    }
}

/// Comparison lexeme, mirrored when negated.
pub(crate) fn comparison_lexeme(operator: ComparisonOperator, negated: bool) -> &'static str {
    use ComparisonOperator as Op;
    match (operator, negated) {
        (Op::Eq, false) => "=",
        (Op::Eq, true) => "<>",
        (Op::Gt, false) | (Op::Lte, true) => ">",
        (Op::Gt, true) | (Op::Lte, false) => "<=",
        (Op::Gte, false) | (Op::Lt, true) => ">=",
        (Op::Gte, true) | (Op::Lt, false) => "<",
        _ => "=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_delimiters() {
        assert_eq!(Postgres.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(SqlServer.quote("a]b"), "[a]]b]");
    }

    #[test]
    fn negation_mirrors_operators() {
        assert_eq!(comparison_lexeme(ComparisonOperator::Gt, true), "<=");
        assert_eq!(comparison_lexeme(ComparisonOperator::Lte, true), ">");
        assert_eq!(comparison_lexeme(ComparisonOperator::Eq, true), "<>");
    }

    #[test]
    fn unknown_conditions_read_as_false() {
        assert_eq!(Postgres.known("(a OR b)"), "COALESCE((a OR b), FALSE)");
        assert_eq!(
            SqlServer.known("(a OR b)"),
            "(CASE WHEN (a OR b) THEN 1 ELSE 0 END = 1)"
        );
    }

    #[test]
    fn sql_server_in_lowers_column() {
        let mut params = Parameters::default();
        let sql = SqlServer.text_in(&mut params, "[name]", &["a_b".to_string()], InMode::Eq, false);
        assert_eq!(sql, "LOWER([name]) IN (@p0)");
        assert_eq!(params.get("@p0"), Some(&Value::String("a_b".to_string())));
    }
}
