mod common;

use std::sync::Arc;

use common::{ids, now, orders, records, tokenize};
use serde_json::json;
use sieve_query::{
    EngineConfig, EvalOptions, MemoryResult, PredicateCompiler, QueryOrchestrator, TokenizeInput,
};

fn run(query: &str) -> MemoryResult {
    let orchestrator = QueryOrchestrator::new(Arc::new(EngineConfig::default()));
    let (result, _) = orchestrator
        .filter(&orders(), &TokenizeInput::new(query), &records(), EvalOptions::new(now()))
        .unwrap();
    result
}

fn matching(query: &str) -> Vec<i64> {
    ids(&run(query).items)
}

#[test]
fn test_text_comparison_ignores_case() {
    assert_eq!(matching("name=eq.ALICE"), vec![1]);
    assert_eq!(matching("name=stw.c"), vec![4]);
    assert_eq!(matching("name=like.*o*"), vec![2, 4]);
}

#[test]
fn test_normalized_text_ignores_accents() {
    assert_eq!(matching("customer=eq.zoe"), vec![1, 2]);
    assert_eq!(matching("customer=eq.ZOË"), vec![1, 2]);
    assert_eq!(matching("customer=cs.MIL"), vec![4]);
}

#[test]
fn test_negation_keeps_nulls_on_nullable_fields() {
    assert_eq!(matching("name=not.eq.alice"), vec![2, 3, 4]);
    assert_eq!(matching("amount=not.gt.100"), vec![2, 3]);
    assert_eq!(matching("status=not.eq.open"), vec![2, 4]);
}

#[test]
fn test_numeric_and_temporal_comparison() {
    assert_eq!(matching("amount=gt.100"), vec![1, 4]);
    assert_eq!(matching("amount=lte.15"), vec![2]);
    assert_eq!(matching("created=gt.2024-03-12"), vec![4]);
    assert_eq!(matching("created=gte.2024-03-12T23:00:00"), vec![1, 4]);
}

#[test]
fn test_membership() {
    assert_eq!(matching("status=in.(OPEN,held)"), vec![1, 2, 3]);
    assert_eq!(matching("status=not.in.(open)"), vec![2, 4]);
    assert_eq!(matching("name=stw.in.(al,ca)"), vec![1, 4]);
    assert_eq!(matching("amount=in.(15,980)"), vec![2, 4]);
}

#[test]
fn test_is_tokens() {
    assert_eq!(matching("active=is.true"), vec![1, 4]);
    assert_eq!(matching("active=is.not.true"), vec![2, 3]);
    assert_eq!(matching("name=is.null"), vec![3]);
    assert_eq!(matching("name=is.not.$empty"), vec![1, 2, 4]);
    assert_eq!(matching("tags=is.$empty"), vec![3, 4]);
}

#[test]
fn test_array_containment_is_exact() {
    assert_eq!(matching("tags.incl(vip,new)"), vec![1]);
    assert_eq!(matching("tags.incl(VIP)"), Vec::<i64>::new());
    assert_eq!(matching("tags.excl(spam)"), vec![1, 3, 4]);
    assert_eq!(matching("tags.not.incl(vip)"), vec![2, 3, 4]);
}

#[test]
fn test_date_ranges() {
    // Monday 2024-03-04 00:00 until now
    assert_eq!(matching("created=ago.1w"), vec![1, 4]);
    assert_eq!(matching("created=not.ago.1w"), vec![2, 3]);
    // February 2024
    assert_eq!(matching("created=ago.1me"), vec![2]);
    // the last 24 hours
    assert_eq!(matching("created=ago.1ds"), vec![4]);
    assert_eq!(matching("created=ago.1d"), vec![1, 4]);
    assert_eq!(matching("created=for.1w"), Vec::<i64>::new());
}

#[test]
fn test_groups() {
    assert_eq!(matching("or=(status.eq.closed,amount.lt.20)"), vec![2, 4]);
    assert_eq!(matching("not.or=(status.eq.closed,amount.lt.20)"), vec![1, 3]);
    assert_eq!(
        matching("or=(name.eq.bob,and(status.eq.open,active.is.true))"),
        vec![1, 2]
    );
}

#[test]
fn test_nested_filter_over_json_object() {
    assert_eq!(matching("address.with=(city.eq.oslo)"), vec![1, 4]);
    assert_eq!(matching("address.with=(city.eq.oslo,zip.stw.01)"), vec![1]);
    // a NULL object has NULL members
    assert_eq!(matching("address.with=(zip.is.null)"), vec![3, 4]);
}

#[test]
fn test_nested_filter_over_json_array() {
    assert_eq!(matching("lines.with=(qty.gt.5)"), vec![3]);
    assert_eq!(matching("lines.with=(sku.eq.a-1,qty.eq.2)"), vec![1]);
    // children must hold on the same element
    assert_eq!(matching("lines.with=(sku.eq.a-1,qty.eq.1)"), Vec::<i64>::new());
    // empty and NULL arrays behave as one element with NULL members
    assert_eq!(matching("lines.with=(qty.not.gt.5)"), vec![1, 2, 4]);
}

#[test]
fn test_sort_places_nulls_at_the_sentinel() {
    assert_eq!(matching("paging=(sort(amount.desc))"), vec![4, 1, 2, 3]);
    assert_eq!(matching("paging=(sort(amount.asc))"), vec![3, 2, 1, 4]);
}

#[test]
fn test_keyset_resumes_after_cursor() {
    assert_eq!(
        matching("paging=(sort(amount.desc.120.5,$key.asc.1))"),
        vec![2, 3]
    );
    assert_eq!(
        matching("paging=(sort(amount.asc.$null,$key.asc.3))"),
        vec![2, 1, 4]
    );
}

#[test]
fn test_three_column_keyset_skips_the_cursor_row() {
    // sorted: 3 (NULL name), 1 Alice, 4 Carol, 2 bob
    assert_eq!(
        matching("paging=(sort(name.asc.Alice,amount.desc.120.5,$key.asc.1))"),
        vec![4, 2]
    );
    assert_eq!(
        matching("paging=(sort(name.asc.Alice,amount.desc.500,$key.asc.9))"),
        vec![1, 4, 2]
    );
}

#[test]
fn test_limit_applies_after_sort() {
    assert_eq!(matching("paging=(sort(id.desc),limit.2)"), vec![4, 3]);
}

#[test]
fn test_projection() {
    let result = run("select=name,status&id=eq.1");
    assert_eq!(result.items, vec![json!({"name": "Alice", "status": "open"})]);

    let result = run("id=eq.3");
    let item = result.items[0].as_object().unwrap();
    assert_eq!(item.len(), 10);
    assert!(item.contains_key("lines"));
    assert!(!item.contains_key("secret"));
}

#[test]
fn test_total_count() {
    let result = run("status=eq.open&paging=(limit.1,count.true)");
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.total_count, Some(2));

    assert_eq!(run("status=eq.open").total_count, None);
}

#[test]
fn test_count_only_and_meta_only_return_no_items() {
    let orchestrator = QueryOrchestrator::new(Arc::new(EngineConfig::default()));
    let (result, meta) = orchestrator
        .filter(
            &orders(),
            &TokenizeInput::new("status=eq.open&paging=(count.true)"),
            &records(),
            EvalOptions::new(now()),
        )
        .unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.total_count, Some(2));
    assert!(meta.is_count_only && meta.show_count);

    let result = run("metaInclude=filters");
    assert!(result.items.is_empty());
    assert_eq!(result.total_count, None);
}

#[test]
fn test_predicate_compiler_directly() {
    let schema = orders();
    let query = tokenize("or=(tags.incl(spam),address.with(city.eq.oslo))");
    let compiled = PredicateCompiler::new(&schema, EvalOptions::new(now()))
        .compile(&query)
        .unwrap();
    let records = records();
    let hits: Vec<bool> = records.iter().map(|r| compiled.matches(r)).collect();
    assert_eq!(hits, vec![true, true, false, true]);
}
