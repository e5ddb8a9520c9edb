//! SQL backend.
//!
//! Compiles a [`TokenizedQuery`](crate::service::TokenizedQuery) into
//! parameterized SQL. The token walk lives in [`compiler`]; everything that
//! differs between databases sits behind [`dialect::SqlDialect`]. User values
//! never reach the SQL text: every literal is bound as a named parameter
//! (`@p0`, `@p1`, …).

pub mod compiler;
pub mod dialect;
pub mod keyset;

pub use compiler::{SqlCompiler, SqlOptions};
pub use dialect::{SqlDialect, dialect_for};

use serde_json::{Map, Value as JsonValue};

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

/// Ordered parameter list of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    items: Vec<SqlParameter>,
}

impl Parameters {
    /// Bind `value` and return its placeholder.
    pub fn bind(&mut self, value: Value) -> String {
        let name = format!("@p{}", self.items.len());
        self.items.push(SqlParameter {
            name: name.clone(),
            value,
        });
        name
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.items.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SqlParameter> {
        self.items.iter()
    }
}

/// A statement ready to hand to a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Parameters,
}

impl SqlStatement {
    /// Parameter values keyed by placeholder.
    pub fn params_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.value.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}
