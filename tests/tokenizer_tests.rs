use sieve_query::ast::{ComparisonOperator, InMode, NestingOperator};
use sieve_query::{EngineConfig, Token, TokenKind, Tokenizer, canonical_query};

fn tokenize(query: &str) -> Vec<Token> {
    Tokenizer::new(5).tokenize(query).unwrap()
}

fn error_code(query: &str) -> &'static str {
    Tokenizer::new(5).tokenize(query).unwrap_err().code()
}

const QUERIES: &[&str] = &[
    "name=eq.Alice",
    "age=not.gt.30",
    "version=eq.1.2.3",
    "status=in.(open,held)",
    "name=not.stw.in.(al,bo)",
    "created=ago.2w",
    "created=not.for.3mes",
    "active=is.true",
    "name=is.not.$empty",
    "tags.incl(vip,new)",
    "tags.not.excl(spam)",
    "or=(age.lt.18,age.gt.65)",
    "not.and=(name.eq.a,or(status.eq.b,status.eq.c))",
    "address.with=(city.eq.Oslo,zip.stw.01)",
    "lines.with=(sku.eq.A,or(qty.gt.1,qty.is.null))",
    "select=name,age",
    "select=*",
    "paging=(sort(name.asc,$key.desc),limit.20,count.true)",
    "paging=(sort(name.asc.Bob,$key.asc.42))",
    "metaInclude=filters,subscriptions",
    "name=eq.Alice^find alice",
];

#[test]
fn test_delimiter_depends_on_level() {
    let tokens = tokenize("or=(field1.eq.1,field2.in.(a,b,c))");
    assert_eq!(tokens.len(), 1);
    let Token::Group(group) = &tokens[0] else {
        panic!("expected a group, got {:?}", tokens[0]);
    };
    assert_eq!(group.operator, NestingOperator::Or);
    assert_eq!(group.children.len(), 2);

    let Token::Comparison(first) = &group.children[0] else {
        panic!("expected a comparison");
    };
    assert_eq!(first.field, "field1");
    assert_eq!(first.operator, ComparisonOperator::Eq);
    assert_eq!(first.value, "1");
    assert_eq!(first.nesting_level, 2);

    let Token::In(second) = &group.children[1] else {
        panic!("expected an in expression");
    };
    assert_eq!(second.field, "field2");
    assert_eq!(second.values, vec!["a", "b", "c"]);
    assert_eq!(second.mode, InMode::Eq);
}

#[test]
fn test_top_level_fragments_split_on_ampersand() {
    let kinds: Vec<TokenKind> = tokenize("name=eq.a&age=gt.3&paging=(limit.5)")
        .iter()
        .map(Token::kind)
        .collect();
    assert_eq!(kinds, vec![TokenKind::Comparison, TokenKind::Comparison, TokenKind::Paging]);
}

#[test]
fn test_every_fragment_round_trips() {
    for query in QUERIES {
        let tokens = tokenize(query);
        let rendered = tokens
            .iter()
            .map(Token::to_query_string)
            .collect::<Vec<_>>()
            .join("&");
        assert_eq!(tokenize(&rendered), tokens, "round trip of {query}");
    }
}

#[test]
fn test_canonical_form_is_idempotent() {
    let query = QUERIES.join("&").replace("select=*&", "");
    let canonical = canonical_query(&tokenize(&query));
    assert_eq!(canonical_query(&tokenize(&canonical)), canonical);
}

#[test]
fn test_canonical_form_ignores_fragment_order() {
    let a = canonical_query(&tokenize("paging=(limit.5)&tags.incl(x)&name=eq.a&active=is.true"));
    let b = canonical_query(&tokenize("active=is.true&name=eq.a&paging=(limit.5)&tags.incl(x)"));
    assert_eq!(a, b);
    assert_eq!(a, "name=eq.a&active=is.true&tags.incl(x)&paging=(limit.5)");
}

#[test]
fn test_canonical_form_orders_group_children() {
    let canonical = canonical_query(&tokenize("or=(tags.incl(x),status.in.(a),name.eq.b)"));
    assert_eq!(canonical, "or=(name.eq.b,status.in.(a),tags.incl(x))");
}

#[test]
fn test_percent_sign_survives_canonical_form() {
    let tokens = tokenize("name=cs.100%25");
    let Token::Comparison(c) = &tokens[0] else {
        panic!("expected a comparison");
    };
    assert_eq!(c.value, "100%");
    let canonical = canonical_query(&tokens);
    assert_eq!(canonical, "name=cs.100%25");
    assert_eq!(tokenize(&canonical), tokens);
}

#[test]
fn test_encoded_delimiters_stay_inside_values() {
    let tokens = tokenize("or=(name.eq.a%2Cb,status.eq.open)");
    let Token::Group(group) = &tokens[0] else {
        panic!("expected a group");
    };
    let Token::Comparison(c) = &group.children[0] else {
        panic!("expected a comparison");
    };
    assert_eq!(c.value, "a,b");
    assert_eq!(group.children.len(), 2);

    let tokens = tokenize("name=eq.a%26b");
    let Token::Comparison(c) = &tokens[0] else {
        panic!("expected a comparison");
    };
    assert_eq!(c.value, "a&b");

    let tokens = tokenize("status=in.(x%2Cy,z)");
    let Token::In(t) = &tokens[0] else {
        panic!("expected an in token");
    };
    assert_eq!(t.values, vec!["x,y", "z"]);
}

#[test]
fn test_values_with_delimiters_round_trip() {
    for query in [
        "or=(name.eq.a%2Cb,status.eq.open)",
        "name=eq.a%26b",
        "name=eq.%28a%29%5Eb^note%5E",
        "tags.incl(a%2Cb,c%29)",
        "paging=(sort(name.asc.a%2Cb,$key.asc.%24null))",
    ] {
        let tokens = tokenize(query);
        let canonical = canonical_query(&tokens);
        assert_eq!(canonical, query);
        assert_eq!(tokenize(&canonical), tokens);
    }
}

#[test]
fn test_escaped_dollar_is_a_plain_cursor_value() {
    let tokens = tokenize("paging=(sort(name.asc.%24null,$key.asc.$null))");
    let Token::Paging(paging) = &tokens[0] else {
        panic!("expected paging");
    };
    let sort = paging.sort.as_ref().unwrap();
    assert_eq!(sort.fields[0].cursor, Some(sieve_query::ast::Cursor::Value("$null".to_string())));
    assert_eq!(sort.fields[1].cursor, Some(sieve_query::ast::Cursor::Null));
}

#[test]
fn test_recognizers_are_mutually_exclusive() {
    let tokenizer = Tokenizer::new(5);
    let grammar = tokenizer.grammar();
    for query in QUERIES {
        let fragment = query.split('^').next().unwrap_or(query);
        let kinds = grammar.matching_kinds(fragment, 1);
        assert_eq!(kinds.len(), 1, "{fragment} matched {kinds:?}");
    }

    let nested = [
        "name.eq.Alice",
        "status.not.in.(a,b)",
        "created.ago.1d",
        "active.is.false",
        "tags.excl(a)",
        "or(a.eq.1,b.eq.2)",
        "address.with(city.eq.x)",
        "sort(name.asc)",
        "limit.10",
        "count.false",
    ];
    for fragment in nested {
        let kinds = grammar.matching_kinds(fragment, 2);
        assert_eq!(kinds.len(), 1, "{fragment} matched {kinds:?}");
    }
}

#[test]
fn test_level_one_syntax_is_rejected_below_the_top() {
    assert_eq!(error_code("or=(name=eq.a)"), "NotSupported");
    assert_eq!(error_code("paging=(select=name)"), "NotSupported");
    assert_eq!(error_code("limit.5"), "NotSupported");
}

#[test]
fn test_malformed_fragments_report_their_kind() {
    assert_eq!(error_code("name=zz.a"), "NotSupported");
    assert_eq!(error_code("status=in.()"), "InvalidIn");
    assert_eq!(error_code("created=ago.2q"), "InvalidDateRange");
    assert_eq!(error_code("active=is.maybe"), "InvalidIsToken");
    assert_eq!(error_code("or=()"), "InvalidGroup");
    assert_eq!(error_code("paging=(limit.0)"), "InvalidLimit");
    assert_eq!(error_code("metaInclude=everything"), "InvalidMetaInclude");
    assert_eq!(error_code("paging=(sort(name.up))"), "InvalidSort");
}

#[test]
fn test_unbalanced_parentheses_are_malformed() {
    assert_eq!(error_code("or=(name.eq.a"), "MalformedQuery");
}

#[test]
fn test_nesting_depth_comes_from_config() {
    let config = EngineConfig {
        max_nesting_depth: 2,
        ..EngineConfig::default()
    };
    let tokenizer = Tokenizer::from_config(&config);
    assert!(tokenizer.tokenize("or=(a.eq.1)").is_ok());
    let err = tokenizer.tokenize("or=(and(a.eq.1))").unwrap_err();
    assert_eq!(err.code(), "ExceededNesting");
}

#[test]
fn test_nested_filter_children_carry_their_json_path() {
    let tokens = tokenize("lines.with=(sku.eq.A,meta.with(kind.eq.x))");
    let Token::NestedFilter(outer) = &tokens[0] else {
        panic!("expected a nested filter");
    };
    assert_eq!(outer.children[0].json_path(), ["lines".to_string()]);
    let Token::NestedFilter(inner) = &outer.children[1] else {
        panic!("expected a nested filter");
    };
    assert_eq!(
        inner.children[0].json_path(),
        ["lines".to_string(), "meta".to_string()]
    );
}
