//! Query orchestration.
//!
//! Ties the tokenization service to a backend and decides which statements a
//! request needs: a count-only query skips the row statement, a meta-only query
//! skips both, and the row statement is wrapped for JSON aggregation on request.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::{self, EngineConfig};
use crate::error::Result;
use crate::evaluator::{EvalOptions, MemoryQuery, MemoryResult, PredicateCompiler};
use crate::metadata::EntityMetadata;
use crate::service::{TokenizationService, TokenizeInput, TokenizedQuery};
use crate::sql::{SqlCompiler, SqlOptions, SqlStatement};

/// What the caller needs to know about a compiled query besides its rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMeta {
    pub show_count: bool,
    pub canonical_query: String,
    pub selected_fields: Vec<String>,
    /// Side-channel metadata sections asked for with `metaInclude`
    pub requested_meta: Vec<String>,
    pub is_count_only: bool,
    pub is_meta_only: bool,
}

impl ResultMeta {
    fn new(metadata: &dyn EntityMetadata, query: &TokenizedQuery) -> Self {
        let selected_fields = match query.select() {
            Some(select) if !select.is_all() => select.fields.clone(),
            _ => metadata
                .fields()
                .iter()
                .filter(|f| f.selectable)
                .map(|f| f.name.clone())
                .collect(),
        };
        let requested_meta = query
            .meta_include()
            .map(|meta| {
                [
                    (meta.filters, "filters"),
                    (meta.columns, "columns"),
                    (meta.subscriptions, "subscriptions"),
                ]
                .into_iter()
                .filter(|(on, _)| *on)
                .map(|(_, name)| name.to_string())
                .collect()
            })
            .unwrap_or_default();

        ResultMeta {
            show_count: query.show_count() || query.is_count_only,
            canonical_query: query.canonical.clone(),
            selected_fields,
            requested_meta,
            is_count_only: query.is_count_only,
            is_meta_only: query.is_meta_only,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    /// Absent for count-only and meta-only queries
    pub rows: Option<SqlStatement>,
    pub count: Option<SqlStatement>,
    pub meta: ResultMeta,
}

pub struct CompiledMemory {
    pub query: MemoryQuery,
    pub meta: ResultMeta,
}

impl CompiledMemory {
    pub fn run(&self, records: &[JsonValue]) -> MemoryResult {
        self.query.run(records)
    }
}

pub struct QueryOrchestrator {
    config: Arc<EngineConfig>,
    service: TokenizationService,
}

impl QueryOrchestrator {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        let service = TokenizationService::new(config.clone());
        QueryOrchestrator { config, service }
    }

    /// Orchestrator over the process-wide configuration.
    pub fn from_installed() -> Self {
        QueryOrchestrator::new(config::current())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn service(&self) -> &TokenizationService {
        &self.service
    }

    pub fn compile_sql(
        &self,
        metadata: &dyn EntityMetadata,
        input: &TokenizeInput,
        options: SqlOptions,
    ) -> Result<CompiledSql> {
        let query = self.service.tokenize(metadata, input)?;
        self.compile_tokens_sql(metadata, &query, options)
    }

    pub fn compile_tokens_sql(
        &self,
        metadata: &dyn EntityMetadata,
        query: &TokenizedQuery,
        options: SqlOptions,
    ) -> Result<CompiledSql> {
        let meta = ResultMeta::new(metadata, query);
        let compiler = SqlCompiler::new(self.config.dialect, metadata, options);

        let rows = if query.fetches_rows() {
            Some(compiler.rows(query)?)
        } else {
            None
        };
        let count = if meta.show_count && !query.is_meta_only {
            Some(compiler.count(query)?)
        } else {
            None
        };
        debug!(
            target: "sieve::sql",
            entity = metadata.entity_name(),
            rows = rows.is_some(),
            count = count.is_some(),
            "query compiled"
        );
        Ok(CompiledSql { rows, count, meta })
    }

    pub fn compile_memory(
        &self,
        metadata: &dyn EntityMetadata,
        input: &TokenizeInput,
        options: EvalOptions,
    ) -> Result<CompiledMemory> {
        let query = self.service.tokenize(metadata, input)?;
        let compiled = PredicateCompiler::new(metadata, options).compile(&query)?;
        Ok(CompiledMemory {
            query: compiled,
            meta: ResultMeta::new(metadata, &query),
        })
    }

    /// Tokenize, compile and run against `records` in one go.
    pub fn filter(
        &self,
        metadata: &dyn EntityMetadata,
        input: &TokenizeInput,
        records: &[JsonValue],
        options: EvalOptions,
    ) -> Result<(MemoryResult, ResultMeta)> {
        let compiled = self.compile_memory(metadata, input, options)?;
        Ok((compiled.run(records), compiled.meta))
    }
}
