mod common;

use std::sync::Arc;

use common::{orders, service, tokenize};
use sieve_query::{DslError, EngineConfig, TokenizationService, TokenizeInput};

fn error_code(input: TokenizeInput) -> &'static str {
    service().tokenize(&orders(), &input).unwrap_err().code()
}

#[test]
fn test_default_limit_is_inserted() {
    let query = tokenize("name=eq.Alice");
    assert_eq!(query.limit(), Some(50));
    assert_eq!(query.canonical, "name=eq.Alice&paging=(limit.50)");
    assert!(query.fetches_rows());
}

#[test]
fn test_default_limit_keeps_existing_paging_children() {
    let query = tokenize("paging=(count.true,sort(name.desc))");
    assert_eq!(query.limit(), Some(50));
    assert!(query.show_count());
    assert_eq!(
        query.canonical,
        "paging=(sort(name.desc,id.asc),limit.50,count.true)"
    );
}

#[test]
fn test_ignore_limit_forces_safe_maximum() {
    let input = TokenizeInput::new("name=eq.a&paging=(limit.20)").ignore_limit(true);
    let query = service().tokenize(&orders(), &input).unwrap();
    assert_eq!(query.limit(), Some(1_000_000));

    let input = TokenizeInput::new("name=eq.a").ignore_limit(true);
    let query = service().tokenize(&orders(), &input).unwrap();
    assert_eq!(query.limit(), Some(1_000_000));
}

#[test]
fn test_limit_above_maximum_is_rejected() {
    let err = service()
        .tokenize(&orders(), &TokenizeInput::new("paging=(limit.1001)"))
        .unwrap_err();
    assert_eq!(
        err,
        DslError::ExceededMaxItems {
            requested: 1001,
            max: 1000
        }
    );
    assert_eq!(tokenize("paging=(limit.1000)").limit(), Some(1000));
}

#[test]
fn test_limits_follow_the_configuration() {
    let config = EngineConfig {
        default_page_size: 10,
        max_page_size: 25,
        max_safe_count: 500,
        ..EngineConfig::default()
    };
    let service = TokenizationService::new(Arc::new(config));
    let query = service.tokenize(&orders(), &TokenizeInput::new("name=eq.a")).unwrap();
    assert_eq!(query.limit(), Some(10));
    let err = service
        .tokenize(&orders(), &TokenizeInput::new("paging=(limit.26)"))
        .unwrap_err();
    assert_eq!(err.code(), "ExceededMaxItems");
    let input = TokenizeInput::new("paging=(limit.26)").ignore_limit(true);
    assert_eq!(service.tokenize(&orders(), &input).unwrap().limit(), Some(500));
}

#[test]
fn test_defaults_fill_missing_categories() {
    let input = TokenizeInput::new("name=eq.a")
        .with_default("status=eq.open&select=name&paging=(sort(name.asc),limit.10)");
    let query = service().tokenize(&orders(), &input).unwrap();
    assert_eq!(
        query.canonical,
        "select=name&name=eq.a&paging=(sort(name.asc,id.asc),limit.10)"
    );
}

#[test]
fn test_user_paging_replaces_default_paging_wholesale() {
    let input = TokenizeInput::new("paging=(limit.5)").with_default("paging=(sort(name.desc),limit.10)");
    let query = service().tokenize(&orders(), &input).unwrap();
    assert!(query.sort().is_none());
    assert_eq!(query.canonical, "paging=(limit.5)");
}

#[test]
fn test_default_filters_apply_when_user_has_none() {
    let input = TokenizeInput::new("select=name").with_default("status=eq.open");
    let query = service().tokenize(&orders(), &input).unwrap();
    assert_eq!(query.filters().count(), 1);
    assert_eq!(query.canonical, "select=name&status=eq.open&paging=(limit.50)");
}

#[test]
fn test_defaults_are_validated_too() {
    let input = TokenizeInput::new("name=eq.a").with_default("paging=(sort(status.asc))");
    assert_eq!(error_code(input), "ColumnNotSortable");
}

#[test]
fn test_tie_breaker_only_with_sort() {
    let query = tokenize("paging=(sort(amount.desc),limit.5)");
    let fields: Vec<&str> = query
        .sort()
        .unwrap()
        .fields
        .iter()
        .map(|f| f.field.as_str())
        .collect();
    assert_eq!(fields, vec!["amount", "id"]);

    assert!(tokenize("paging=(limit.5)").sort().is_none());
    assert_eq!(tokenize("paging=(sort($key.desc))").sort().unwrap().fields.len(), 1);
    assert_eq!(tokenize("paging=(sort(id.desc))").sort().unwrap().fields.len(), 1);
}

#[test]
fn test_count_only_query_skips_rows_and_limit() {
    let query = tokenize("status=eq.open&paging=(count.true)");
    assert!(query.is_count_only);
    assert!(!query.fetches_rows());
    assert_eq!(query.limit(), None);
    assert_eq!(query.canonical, "status=eq.open&paging=(count.true)");
}

#[test]
fn test_meta_only_query() {
    let query = tokenize("metaInclude=columns,filters");
    assert!(query.is_meta_only);
    assert!(!query.fetches_rows());
    assert!(query.paging().is_none());
    assert_eq!(query.canonical, "metaInclude=filters,columns");

    let query = tokenize("metaInclude=columns&name=eq.a");
    assert!(!query.is_meta_only);
    assert_eq!(query.limit(), Some(50));
}

#[test]
fn test_defaults_do_not_turn_meta_only_into_a_row_fetch() {
    let input = TokenizeInput::new("metaInclude=filters").with_default("status=eq.open&select=name");
    let query = service().tokenize(&orders(), &input).unwrap();
    assert!(query.is_meta_only);
    assert!(!query.fetches_rows());
    assert_eq!(query.canonical, "metaInclude=filters");
}

#[test]
fn test_count_only_keeps_default_filters() {
    let input = TokenizeInput::new("paging=(count.true)").with_default("status=eq.open&paging=(limit.10)");
    let query = service().tokenize(&orders(), &input).unwrap();
    assert!(query.is_count_only);
    assert_eq!(query.limit(), None);
    assert_eq!(query.canonical, "status=eq.open&paging=(count.true)");
}

#[test]
fn test_singletons() {
    assert_eq!(error_code(TokenizeInput::new("select=name&select=status")), "InvalidSelect");
    assert_eq!(
        error_code(TokenizeInput::new("metaInclude=columns&metaInclude=filters")),
        "InvalidMetaInclude"
    );
}

#[test]
fn test_field_capabilities_are_checked() {
    assert_eq!(error_code(TokenizeInput::new("missing=eq.1")), "TokenFieldInvalid");
    assert_eq!(error_code(TokenizeInput::new("secret=eq.x")), "TokenFieldInvalid");
    assert_eq!(error_code(TokenizeInput::new("select=secret")), "TokenFieldInvalid");
    assert_eq!(error_code(TokenizeInput::new("paging=(sort(status.asc))")), "ColumnNotSortable");
    assert_eq!(error_code(TokenizeInput::new("address.with=(country.eq.NO)")), "TokenFieldInvalid");
}

#[test]
fn test_operators_are_checked_against_field_types() {
    assert_eq!(error_code(TokenizeInput::new("amount=stw.1")), "UnsupportedComparison");
    assert_eq!(error_code(TokenizeInput::new("active=gt.true")), "UnsupportedComparison");
    assert_eq!(error_code(TokenizeInput::new("name=ago.2d")), "UnsupportedComparison");
    assert_eq!(error_code(TokenizeInput::new("name.incl(a)")), "UnsupportedComparison");
    assert_eq!(error_code(TokenizeInput::new("amount=is.true")), "UnsupportedComparison");
    assert_eq!(error_code(TokenizeInput::new("name.with=(city.eq.x)")), "UnsupportedComparison");
    assert_eq!(error_code(TokenizeInput::new("amount=stw.in.(1)")), "UnsupportedComparison");
}

#[test]
fn test_values_are_checked_against_field_types() {
    assert_eq!(error_code(TokenizeInput::new("amount=gt.lots")), "InvalidComparison");
    assert_eq!(error_code(TokenizeInput::new("id=in.(1,two)")), "InvalidIn");
    assert_eq!(
        error_code(TokenizeInput::new("paging=(sort(amount.asc.x,$key.asc.1))")),
        "InvalidSort"
    );
}

#[test]
fn test_date_range_span_guard() {
    let config = EngineConfig {
        max_date_range_days: Some(31),
        ..EngineConfig::default()
    };
    let service = TokenizationService::new(Arc::new(config));
    assert!(service.tokenize(&orders(), &TokenizeInput::new("created=ago.4w")).is_ok());
    let err = service
        .tokenize(&orders(), &TokenizeInput::new("created=ago.2m"))
        .unwrap_err();
    assert_eq!(err.code(), "InvalidDateRange");
}

#[test]
fn test_skip_validation() {
    let input = TokenizeInput::new("missing=eq.1").skip_validation(true);
    let query = service().tokenize(&orders(), &input).unwrap();
    assert_eq!(query.canonical, "missing=eq.1&paging=(limit.50)");
}
