//! Compile and run sieve queries for the CLI

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::{Value as JsonValue, json};

use super::{CliError, statement_to_json};
use crate::{
    EngineConfig, EntitySchema, EvalOptions, QueryOrchestrator, SqlOptions, TokenizeInput,
    Tokenizer, canonical_query,
};

/// Options shared by the compile and filter commands
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// The sieve query to compile
    pub query: String,
    /// Fallback query for categories the main query leaves out
    pub default_query: Option<String>,
    /// Replace the page size with the configured safe maximum
    pub ignore_limit: bool,
    /// Wrap the row statement so it returns one JSON array
    pub json_aggregate: bool,
    /// Reference instant for relative date ranges
    pub now: NaiveDateTime,
}

impl CompileOptions {
    fn input(&self) -> TokenizeInput {
        let input = TokenizeInput::new(self.query.clone()).ignore_limit(self.ignore_limit);
        match &self.default_query {
            Some(default_query) => input.with_default(default_query.clone()),
            None => input,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub compile: CompileOptions,
    /// JSON array of records
    pub records: Option<String>,
}

/// Compile a query to SQL for the configured dialect.
pub fn execute_compile(
    config: EngineConfig,
    schema: &EntitySchema,
    options: &CompileOptions,
) -> Result<JsonValue, CliError> {
    let sql_options = SqlOptions::from_config(&config, options.now).json_aggregate(options.json_aggregate);
    let orchestrator = QueryOrchestrator::new(Arc::new(config));
    let compiled = orchestrator.compile_sql(schema, &options.input(), sql_options)?;

    Ok(json!({
        "rows": compiled.rows.as_ref().map(statement_to_json),
        "count": compiled.count.as_ref().map(statement_to_json),
        "meta": serde_json::to_value(&compiled.meta)?,
    }))
}

/// Run a query over a JSON array of records in memory.
pub fn execute_filter(
    config: EngineConfig,
    schema: &EntitySchema,
    options: &FilterOptions,
) -> Result<JsonValue, CliError> {
    let records = super::parse_records(options.records.as_deref().ok_or(CliError::NoInput)?)?;
    let eval_options = EvalOptions::from_config(&config, options.compile.now);
    let orchestrator = QueryOrchestrator::new(Arc::new(config));
    let (result, meta) =
        orchestrator.filter(schema, &options.compile.input(), &records, eval_options)?;

    Ok(json!({
        "items": result.items,
        "totalCount": result.total_count,
        "meta": serde_json::to_value(&meta)?,
    }))
}

/// Canonical form of a query.
///
/// With a schema the query goes through the full service (validation, defaults,
/// page size, tie-breaker); without one it is only tokenized.
pub fn execute_canonical(
    config: EngineConfig,
    schema: Option<&EntitySchema>,
    query: &str,
) -> Result<String, CliError> {
    match schema {
        Some(schema) => {
            let orchestrator = QueryOrchestrator::new(Arc::new(config));
            let tokenized = orchestrator.service().tokenize(schema, &TokenizeInput::new(query))?;
            Ok(tokenized.canonical)
        }
        None => {
            let tokens = Tokenizer::from_config(&config).tokenize(query)?;
            Ok(canonical_query(&tokens))
        }
    }
}
