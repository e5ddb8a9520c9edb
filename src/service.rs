//! Tokenization service.
//!
//! Runs the tokenizer for one entity and turns its raw output into a query the
//! backends can compile without further checks:
//!
//! 1. tokenize the query
//! 2. classify count-only and meta-only queries
//! 3. fill categories the caller left empty from the default query (never for
//!    a meta-only query)
//! 4. validate field references and operator/type combinations
//! 5. enforce the page-size ceiling and insert the default page size
//! 6. append a key tie-breaker to explicit sorts
//! 7. render the canonical query string

use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::{
    ArrayOperation, Comparison, ComparisonOperator, Cursor, DateRange, InMode, InToken, IsToken,
    IsValue, Limit, MetaInclude, Paging, Select, Sort, SortDirection, SortField, Token, TokenKind,
    canonical_query,
};
use crate::config::EngineConfig;
use crate::error::{DslError, Result};
use crate::metadata::{EntityMetadata, FieldMetadata, FieldType};
use crate::parser::Tokenizer;
use crate::value::Value;

/// Caller input for one tokenization.
#[derive(Debug, Clone, Default)]
pub struct TokenizeInput {
    pub query: String,
    /// Fallback query whose categories fill the ones `query` leaves empty
    pub default_query: Option<String>,
    /// Force the safe maximum page size instead of rejecting large limits
    pub ignore_limit: bool,
    /// Skip filterable/sortable/selectable checks
    pub skip_validation: bool,
}

impl TokenizeInput {
    pub fn new(query: impl Into<String>) -> Self {
        TokenizeInput {
            query: query.into(),
            ..TokenizeInput::default()
        }
    }

    pub fn with_default(mut self, default_query: impl Into<String>) -> Self {
        self.default_query = Some(default_query.into());
        self
    }

    pub fn ignore_limit(mut self, ignore: bool) -> Self {
        self.ignore_limit = ignore;
        self
    }

    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }
}

/// A validated, normalized token list ready for compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedQuery {
    pub tokens: Vec<Token>,
    pub canonical: String,
    /// Only metadata was requested; no rows need fetching
    pub is_meta_only: bool,
    /// Only a count was requested; no rows need fetching
    pub is_count_only: bool,
}

impl TokenizedQuery {
    pub fn filters(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.kind().is_filter())
    }

    pub fn select(&self) -> Option<&Select> {
        self.tokens.iter().find_map(|t| match t {
            Token::Select(select) => Some(select),
            _ => None,
        })
    }

    pub fn paging(&self) -> Option<&Paging> {
        self.tokens.iter().find_map(|t| match t {
            Token::Paging(paging) => Some(paging),
            _ => None,
        })
    }

    pub fn meta_include(&self) -> Option<&MetaInclude> {
        self.tokens.iter().find_map(|t| match t {
            Token::MetaInclude(meta) => Some(meta),
            _ => None,
        })
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.paging().and_then(|p| p.sort.as_ref())
    }

    pub fn limit(&self) -> Option<u64> {
        self.paging().and_then(|p| p.limit.as_ref()).map(|l| l.value)
    }

    pub fn show_count(&self) -> bool {
        self.paging().is_some_and(Paging::show_count)
    }

    /// Rows have to be fetched for this query.
    pub fn fetches_rows(&self) -> bool {
        !self.is_count_only && !self.is_meta_only
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Select,
    Filter,
    Paging,
    Meta,
}

fn category(token: &Token) -> Category {
    match token.kind() {
        TokenKind::Select => Category::Select,
        TokenKind::Paging | TokenKind::Sort | TokenKind::Limit | TokenKind::ShowCount => {
            Category::Paging
        }
        TokenKind::MetaInclude => Category::Meta,
        _ => Category::Filter,
    }
}

pub struct TokenizationService {
    config: Arc<EngineConfig>,
    tokenizer: Tokenizer,
}

impl TokenizationService {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        let tokenizer = Tokenizer::from_config(&config);
        TokenizationService { config, tokenizer }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn tokenize(
        &self,
        metadata: &dyn EntityMetadata,
        input: &TokenizeInput,
    ) -> Result<TokenizedQuery> {
        let mut tokens = self.tokenizer.tokenize(&input.query)?;

        // Classified on the caller's own tokens; defaults never change the shape.
        let is_count_only = tokens.iter().any(|t| matches!(t, Token::Paging(p) if p.is_count_only()));
        let is_meta_only = !tokens.is_empty() && tokens.iter().all(|t| category(t) == Category::Meta);

        if let Some(default_query) = &input.default_query
            && !is_meta_only
        {
            let defaults = self.tokenizer.tokenize(default_query)?;
            tokens = merge_defaults(tokens, defaults);
        }
        check_singletons(&tokens)?;

        if !input.skip_validation {
            let validator = Validator {
                metadata,
                config: &self.config,
            };
            tokens.iter().try_for_each(|t| validator.token(t))?;
        }

        if !is_count_only && !is_meta_only {
            self.apply_limit(&mut tokens, input.ignore_limit)?;
        }
        add_tie_breaker(&mut tokens, metadata.key_field());

        let canonical = canonical_query(&tokens);
        debug!(
            target: "sieve::service",
            entity = metadata.entity_name(),
            tokens = tokens.len(),
            is_count_only,
            is_meta_only,
            "query prepared"
        );
        trace!(target: "sieve::service", %canonical, "canonical query");

        Ok(TokenizedQuery {
            tokens,
            canonical,
            is_meta_only,
            is_count_only,
        })
    }

    fn apply_limit(&self, tokens: &mut Vec<Token>, ignore_limit: bool) -> Result<()> {
        let config = &self.config;
        let index = match tokens.iter().position(|t| t.kind() == TokenKind::Paging) {
            Some(index) => index,
            None => {
                tokens.push(Token::Paging(Paging::default()));
                tokens.len() - 1
            }
        };
        let Token::Paging(paging) = &mut tokens[index] else {
            return Ok(());
        };

        if ignore_limit {
            paging.limit = Some(Limit::new(config.max_safe_count));
            return Ok(());
        }
        match paging.limit.as_ref().map(|l| l.value) {
            Some(requested) if requested > config.max_page_size => Err(DslError::ExceededMaxItems {
                requested,
                max: config.max_page_size,
            }),
            Some(_) => Ok(()),
            None => {
                paging.limit = Some(Limit::new(config.default_page_size));
                Ok(())
            }
        }
    }
}

/// Categories the user left empty are taken wholesale from the defaults.
fn merge_defaults(user: Vec<Token>, defaults: Vec<Token>) -> Vec<Token> {
    let present: Vec<Category> = user.iter().map(category).collect();
    let mut merged = user;
    merged.extend(
        defaults
            .into_iter()
            .filter(|t| category(t) != Category::Meta && !present.contains(&category(t))),
    );
    merged
}

fn check_singletons(tokens: &[Token]) -> Result<()> {
    let count = |kind: TokenKind| tokens.iter().filter(|t| t.kind() == kind).count();
    if count(TokenKind::Select) > 1 {
        return Err(DslError::InvalidSelect("select appears more than once".to_string()));
    }
    if count(TokenKind::Paging) > 1 {
        return Err(DslError::InvalidPaging("paging appears more than once".to_string()));
    }
    if count(TokenKind::MetaInclude) > 1 {
        return Err(DslError::InvalidMetaInclude(
            "metaInclude appears more than once".to_string(),
        ));
    }
    Ok(())
}

/// Keep sorts stable by ordering on the key field last.
fn add_tie_breaker(tokens: &mut [Token], key_field: &str) {
    for token in tokens.iter_mut() {
        if let Token::Paging(Paging {
            sort: Some(sort), ..
        }) = token
            && !sort.orders_by_key(key_field)
        {
            sort.fields
                .push(SortField::new(key_field, SortDirection::Asc));
        }
    }
}

fn qualified(path: &[String], name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path.join("."), name)
    }
}

struct Validator<'a> {
    metadata: &'a dyn EntityMetadata,
    config: &'a EngineConfig,
}

impl<'a> Validator<'a> {
    fn invalid_field(&self, path: &[String], name: &str, capability: &'static str) -> DslError {
        DslError::TokenFieldInvalid {
            entity: self.metadata.entity_name().to_string(),
            field: qualified(path, name),
            capability,
        }
    }

    fn filterable(&self, path: &[String], name: &str) -> Result<&'a FieldMetadata> {
        self.metadata
            .field(path, name)
            .filter(|f| f.filterable)
            .ok_or_else(|| self.invalid_field(path, name, "filterable"))
    }

    fn token(&self, token: &Token) -> Result<()> {
        let path = token.json_path();
        match token {
            Token::Comparison(c) => self.comparison(self.filterable(path, &c.field)?, c),
            Token::Is(t) => self.is(self.filterable(path, &t.field)?, t),
            Token::In(t) => self.membership(self.filterable(path, &t.field)?, t),
            Token::DateRange(t) => self.date_range(self.filterable(path, &t.field)?, t),
            Token::Array(t) => self.array(self.filterable(path, &t.field)?, t),
            Token::Group(group) => group.children.iter().try_for_each(|c| self.token(c)),
            Token::NestedFilter(nested) => {
                let field = self.filterable(path, &nested.field)?;
                if !field.field_type.is_json() {
                    return Err(DslError::unsupported(&nested.field, "with", &field.field_type));
                }
                nested.children.iter().try_for_each(|c| self.token(c))
            }
            Token::Select(select) => self.select(select),
            Token::Sort(sort) => self.sort(sort),
            Token::Paging(paging) => paging.sort.as_ref().map_or(Ok(()), |s| self.sort(s)),
            Token::Limit(_) | Token::ShowCount(_) | Token::MetaInclude(_) => Ok(()),
        }
    }

    fn comparison(&self, field: &FieldMetadata, c: &Comparison) -> Result<()> {
        let field_type = &field.field_type;
        let supported = match field_type {
            FieldType::Json | FieldType::JsonArray | FieldType::Array(_) => false,
            FieldType::Text => true,
            FieldType::Boolean | FieldType::Uuid => c.operator == ComparisonOperator::Eq,
            _ => !c.operator.is_pattern(),
        };
        if !supported {
            return Err(DslError::unsupported(&c.field, c.operator.as_str(), field_type));
        }
        Value::parse(&c.value, field_type)
            .map(|_| ())
            .ok_or_else(|| DslError::InvalidComparison(format!("'{}' is not a valid {field_type}", c.value)))
    }

    fn is(&self, field: &FieldMetadata, t: &IsToken) -> Result<()> {
        let field_type = &field.field_type;
        let supported = match t.value {
            IsValue::Null => true,
            IsValue::True | IsValue::False => *field_type == FieldType::Boolean,
            IsValue::Empty => field_type.is_text() || field_type.is_collection(),
        };
        if supported {
            Ok(())
        } else {
            Err(DslError::unsupported(&t.field, format!("is.{}", t.value.as_str()), field_type))
        }
    }

    fn membership(&self, field: &FieldMetadata, t: &InToken) -> Result<()> {
        let field_type = &field.field_type;
        if field_type.is_json() || field_type.is_collection() || (t.mode != InMode::Eq && !field_type.is_text())
        {
            return Err(DslError::unsupported(&t.field, "in", field_type));
        }
        match t.values.iter().find(|v| Value::parse(v, field_type).is_none()) {
            Some(bad) => Err(DslError::InvalidIn(format!("'{bad}' is not a valid {field_type}"))),
            None => Ok(()),
        }
    }

    fn date_range(&self, field: &FieldMetadata, t: &DateRange) -> Result<()> {
        if !field.field_type.is_temporal() {
            return Err(DslError::unsupported(&t.field, t.operator.as_str(), &field.field_type));
        }
        match self.config.max_date_range_days {
            Some(max) if t.approximate_days() > max => Err(DslError::InvalidDateRange(format!(
                "a span of about {} days exceeds the maximum of {max}",
                t.approximate_days()
            ))),
            _ => Ok(()),
        }
    }

    fn array(&self, field: &FieldMetadata, t: &ArrayOperation) -> Result<()> {
        let Some(element) = field.field_type.element_type() else {
            return Err(DslError::unsupported(&t.field, t.mode.as_str(), &field.field_type));
        };
        match t.values.iter().find(|v| Value::parse(v, element).is_none()) {
            Some(bad) => Err(DslError::InvalidArrayOperation(format!(
                "'{bad}' is not a valid {element}"
            ))),
            None => Ok(()),
        }
    }

    fn select(&self, select: &Select) -> Result<()> {
        match select
            .fields
            .iter()
            .find(|f| *f != "*" && !self.metadata.is_selectable(f))
        {
            Some(field) => Err(self.invalid_field(&[], field, "selectable")),
            None => Ok(()),
        }
    }

    fn sort(&self, sort: &Sort) -> Result<()> {
        for item in &sort.fields {
            let name = if item.is_key_placeholder() {
                self.metadata.key_field()
            } else if self.metadata.is_sortable(&item.field) || item.field == self.metadata.key_field() {
                item.field.as_str()
            } else {
                return Err(DslError::ColumnNotSortable(item.field.clone()));
            };
            let Some(field) = self.metadata.field(&[], name) else {
                return Err(self.invalid_field(&[], name, "sortable"));
            };
            if let Some(Cursor::Value(raw)) = &item.cursor
                && Value::parse(raw, &field.field_type).is_none()
            {
                return Err(DslError::InvalidSort(format!(
                    "cursor '{raw}' is not a valid {} for '{}'",
                    field.field_type, item.field
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EntitySchema;

    fn schema() -> EntitySchema {
        EntitySchema::new("order", "orders", "id")
            .field(FieldMetadata::new("id", FieldType::Integer).required())
            .field(FieldMetadata::new("name", FieldType::Text).sortable())
            .field(FieldMetadata::new("secret", FieldType::Text).not_filterable().not_selectable())
            .field(FieldMetadata::new("archived", FieldType::Boolean))
    }

    fn service() -> TokenizationService {
        TokenizationService::new(Arc::new(EngineConfig::default()))
    }

    #[test]
    fn key_field_is_sortable_without_flag() {
        let query = service()
            .tokenize(&schema(), &TokenizeInput::new("paging=(sort(id.desc))"))
            .unwrap();
        assert_eq!(query.sort().unwrap().fields.len(), 1);
    }

    #[test]
    fn skip_validation_allows_unknown_fields() {
        let input = TokenizeInput::new("secret=eq.x").skip_validation(true);
        assert!(service().tokenize(&schema(), &input).is_ok());
        let err = service()
            .tokenize(&schema(), &TokenizeInput::new("secret=eq.x"))
            .unwrap_err();
        assert_eq!(err.code(), "TokenFieldInvalid");
    }

    #[test]
    fn rejects_duplicate_paging() {
        let err = service()
            .tokenize(&schema(), &TokenizeInput::new("paging=(limit.1)&paging=(limit.2)"))
            .unwrap_err();
        assert_eq!(err.code(), "InvalidPaging");
    }

    #[test]
    fn boolean_fields_only_take_eq() {
        let err = service()
            .tokenize(&schema(), &TokenizeInput::new("archived=gt.true"))
            .unwrap_err();
        assert_eq!(err.code(), "UnsupportedComparison");
    }
}
