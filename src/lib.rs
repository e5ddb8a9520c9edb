//! A compact query DSL for filtering, sorting and paging entity collections.
//!
//! Query strings such as `name=eq.Alice&or=(age.gt.30,status.in.(active,pending))`
//! are tokenized into a typed [`Token`] tree, validated against
//! [`EntityMetadata`], and compiled either to parameterized SQL
//! ([`sql::SqlCompiler`]) or to an in-memory predicate
//! ([`evaluator::PredicateCompiler`]).
//!
//! ```
//! use std::sync::Arc;
//! use sieve_query::metadata::{EntitySchema, FieldMetadata, FieldType};
//! use sieve_query::{EngineConfig, QueryOrchestrator, TokenizeInput};
//!
//! let schema = EntitySchema::new("order", "orders", "id")
//!     .field(FieldMetadata::new("id", FieldType::Integer).sortable().required())
//!     .field(FieldMetadata::new("name", FieldType::Text).sortable());
//! let orchestrator = QueryOrchestrator::new(Arc::new(EngineConfig::default()));
//! let query = orchestrator
//!     .service()
//!     .tokenize(&schema, &TokenizeInput::new("name=eq.Alice"))
//!     .unwrap();
//! assert_eq!(query.canonical, "name=eq.Alice&paging=(limit.50)");
//! ```

pub mod ast;
pub mod config;
pub mod daterange;
pub mod error;
pub mod evaluator;
pub mod grammar;
pub mod lexer;
pub mod metadata;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod service;
pub mod sql;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Token, TokenKind, canonical_query};
pub use config::{DatabaseDialect, EngineConfig};
pub use error::{DslError, Result};
pub use evaluator::{EvalOptions, MemoryQuery, MemoryResult, PredicateCompiler};
pub use metadata::{EntityMetadata, EntitySchema, FieldMetadata, FieldType};
pub use orchestrator::{CompiledMemory, CompiledSql, QueryOrchestrator, ResultMeta};
pub use parser::Tokenizer;
pub use service::{TokenizationService, TokenizeInput, TokenizedQuery};
pub use sql::{SqlCompiler, SqlOptions, SqlStatement};
pub use value::Value;
