#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value as JsonValue, json};
use sieve_query::metadata::{EntitySchema, FieldMetadata, FieldType};
use sieve_query::{EngineConfig, TokenizationService, TokenizeInput, TokenizedQuery};

pub fn orders() -> EntitySchema {
    EntitySchema::new("order", "orders", "id")
        .field(FieldMetadata::new("id", FieldType::Integer).sortable().required())
        .field(FieldMetadata::new("name", FieldType::Text).sortable())
        .field(FieldMetadata::new("customer", FieldType::Text).normalized())
        .field(FieldMetadata::new("status", FieldType::Text).required())
        .field(FieldMetadata::new("amount", FieldType::Decimal).sortable())
        .field(FieldMetadata::new("active", FieldType::Boolean))
        .field(FieldMetadata::new("created", FieldType::Timestamp).sortable().column("created_at"))
        .field(FieldMetadata::new("tags", FieldType::Array(Box::new(FieldType::Text))))
        .field(
            FieldMetadata::new("address", FieldType::Json).with_fields(vec![
                FieldMetadata::new("city", FieldType::Text),
                FieldMetadata::new("zip", FieldType::Text),
            ]),
        )
        .field(
            FieldMetadata::new("lines", FieldType::JsonArray).with_fields(vec![
                FieldMetadata::new("sku", FieldType::Text),
                FieldMetadata::new("qty", FieldType::Integer),
            ]),
        )
        .field(FieldMetadata::new("secret", FieldType::Text).not_filterable().not_selectable())
}

pub fn service() -> TokenizationService {
    TokenizationService::new(Arc::new(EngineConfig::default()))
}

pub fn tokenize(query: &str) -> TokenizedQuery {
    service()
        .tokenize(&orders(), &TokenizeInput::new(query))
        .unwrap()
}

/// Wednesday 2024-03-13 12:00
pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 13)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn records() -> Vec<JsonValue> {
    vec![
        json!({
            "id": 1, "name": "Alice", "customer": "Zoë", "status": "open",
            "amount": 120.5, "active": true, "created": "2024-03-12T09:30:00",
            "tags": ["vip", "new"],
            "address": {"city": "Oslo", "zip": "0150"},
            "lines": [{"sku": "A-1", "qty": 2}, {"sku": "B-2", "qty": 1}]
        }),
        json!({
            "id": 2, "name": "bob", "customer": "Zoe", "status": "held",
            "amount": 15, "active": false, "created": "2024-02-20T17:00:00",
            "tags": ["spam"],
            "address": {"city": "Bergen", "zip": "5003"},
            "lines": []
        }),
        json!({
            "id": 3, "name": null, "customer": null, "status": "open",
            "amount": null, "active": null, "created": "2023-12-31T23:59:59",
            "tags": [],
            "address": null,
            "lines": [{"sku": "C-3", "qty": 10}]
        }),
        json!({
            "id": 4, "name": "Carol", "customer": "Émile", "status": "closed",
            "amount": 980, "active": true, "created": "2024-03-13T08:00:00",
            "tags": null,
            "address": {"city": "oslo", "zip": null},
            "lines": null
        }),
    ]
}

pub fn ids(items: &[JsonValue]) -> Vec<i64> {
    items.iter().filter_map(|r| r["id"].as_i64()).collect()
}
