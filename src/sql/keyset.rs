//! ORDER BY and keyset continuation.
//!
//! A sort with cursor values resumes strictly after the cursor tuple. Row-value
//! comparison is not portable, so `(k1, k2, k3) > (v1, v2, v3)` is spelled out
//! as a disjunction of AND-chains:
//!
//! ```text
//! k1 > v1
//! OR (k1 = v1 AND k2 > v2)
//! OR (k1 = v1 AND k2 = v2 AND k3 > v3)
//! ```
//!
//! with `<` in place of `>` for descending positions. Nullable columns are
//! compared through `COALESCE(column, sentinel)` on both sides so NULLs take a
//! fixed place in the order.

use crate::ast::{Cursor, Sort, SortDirection};
use crate::error::{DslError, Result};
use crate::metadata::{EntityMetadata, FieldMetadata, FieldType};
use crate::sql::{Parameters, SqlDialect};
use crate::value::Value;

pub struct SortColumn<'a> {
    pub field: &'a FieldMetadata,
    /// Column expression, COALESCEd when the column is nullable
    pub expr: String,
    pub direction: SortDirection,
    pub cursor: Option<Cursor>,
}

/// Resolve sort expressions (including `$key`) against the entity.
pub fn sort_columns<'a>(
    dialect: &dyn SqlDialect,
    metadata: &'a dyn EntityMetadata,
    sort: &Sort,
) -> Result<Vec<SortColumn<'a>>> {
    sort.fields
        .iter()
        .map(|item| {
            let name = if item.is_key_placeholder() {
                metadata.key_field()
            } else {
                item.field.as_str()
            };
            let field = metadata
                .field(&[], name)
                .ok_or_else(|| DslError::ColumnNotSortable(name.to_string()))?;
            let column = dialect.quote(field.column_name());
            let expr = if field.nullable {
                format!("COALESCE({column}, {})", dialect.sentinel(&field.field_type))
            } else {
                column
            };
            Ok(SortColumn {
                field,
                expr,
                direction: item.direction,
                cursor: item.cursor.clone(),
            })
        })
        .collect()
}

pub fn order_by(dialect: &dyn SqlDialect, columns: &[SortColumn<'_>]) -> String {
    columns
        .iter()
        .map(|c| {
            format!(
                "{} {}{}",
                c.expr,
                c.direction.as_str().to_uppercase(),
                dialect.nulls_order(c.direction)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn cursor_expr(
    dialect: &dyn SqlDialect,
    params: &mut Parameters,
    column: &SortColumn<'_>,
    cursor: &Cursor,
) -> Result<String> {
    let field_type = &column.field.field_type;
    let sentinel = || dialect.sentinel(field_type);
    let param = match cursor {
        Cursor::Null => return Ok(sentinel()),
        Cursor::Empty if *field_type == FieldType::Text => params.bind(Value::String(String::new())),
        Cursor::Empty => return Ok(sentinel()),
        Cursor::Value(raw) => {
            let value = Value::parse(raw, field_type).ok_or_else(|| {
                DslError::InvalidSort(format!(
                    "cursor '{raw}' is not a valid {field_type} for '{}'",
                    column.field.name
                ))
            })?;
            params.bind(value)
        }
    };
    Ok(if column.field.nullable {
        format!("COALESCE({param}, {})", sentinel())
    } else {
        param
    })
}

/// WHERE predicate resuming after the cursor tuple; `None` without cursors.
pub fn continuation(
    dialect: &dyn SqlDialect,
    params: &mut Parameters,
    columns: &[SortColumn<'_>],
) -> Result<Option<String>> {
    if columns.is_empty() || columns.iter().any(|c| c.cursor.is_none()) {
        return Ok(None);
    }

    let mut values = Vec::with_capacity(columns.len());
    for column in columns {
        if let Some(cursor) = &column.cursor {
            values.push(cursor_expr(dialect, params, column, cursor)?);
        }
    }

    let clauses: Vec<String> = (0..columns.len())
        .map(|i| {
            let mut parts: Vec<String> = (0..i)
                .map(|j| format!("{} = {}", columns[j].expr, values[j]))
                .collect();
            let op = match columns[i].direction {
                SortDirection::Asc => ">",
                SortDirection::Desc => "<",
            };
            parts.push(format!("{} {op} {}", columns[i].expr, values[i]));
            if parts.len() == 1 {
                parts.remove(0)
            } else {
                format!("({})", parts.join(" AND "))
            }
        })
        .collect();
    Ok(Some(format!("({})", clauses.join(" OR "))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SortField;
    use crate::metadata::EntitySchema;
    use crate::sql::dialect::Postgres;

    fn schema() -> EntitySchema {
        EntitySchema::new("order", "orders", "id")
            .field(FieldMetadata::new("id", FieldType::Integer).required())
            .field(FieldMetadata::new("category", FieldType::Text).sortable())
    }

    #[test]
    fn two_column_continuation() {
        let sort = Sort::new(vec![
            SortField::new("category", SortDirection::Asc).with_cursor(Cursor::Null),
            SortField::new("$key", SortDirection::Desc).with_cursor(Cursor::Value("7".into())),
        ]);
        let schema = schema();
        let columns = sort_columns(&Postgres, &schema, &sort).unwrap();
        let mut params = Parameters::default();
        let sql = continuation(&Postgres, &mut params, &columns).unwrap().unwrap();
        assert_eq!(
            sql,
            "(COALESCE(\"category\", '') > '' OR (COALESCE(\"category\", '') = '' AND \"id\" < @p0))"
        );
        assert_eq!(params.get("@p0"), Some(&Value::Integer(7)));
        assert_eq!(
            order_by(&Postgres, &columns),
            "COALESCE(\"category\", '') ASC NULLS FIRST, \"id\" DESC NULLS LAST"
        );
    }

    #[test]
    fn bad_cursor_is_rejected() {
        let sort = Sort::new(vec![
            SortField::new("$key", SortDirection::Asc).with_cursor(Cursor::Value("abc".into())),
        ]);
        let schema = schema();
        let columns = sort_columns(&Postgres, &schema, &sort).unwrap();
        let err = continuation(&Postgres, &mut Parameters::default(), &columns).unwrap_err();
        assert_eq!(err.code(), "InvalidSort");
    }
}
