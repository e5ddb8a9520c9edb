//! JSON loading and rendering for the CLI

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Value as JsonValue, json};

use super::CliError;
use crate::{EngineConfig, EntitySchema, SqlStatement};

pub fn load_schema(json: &str) -> Result<EntitySchema, CliError> {
    Ok(EntitySchema::from_json_str(json)?)
}

/// Engine configuration from JSON, or the defaults when none is given.
pub fn load_config(json: Option<&str>) -> Result<EngineConfig, CliError> {
    match json {
        Some(json) => Ok(EngineConfig::from_json_str(json)?),
        None => Ok(EngineConfig::default()),
    }
}

pub fn parse_records(json: &str) -> Result<Vec<JsonValue>, CliError> {
    match serde_json::from_str(json)? {
        JsonValue::Array(items) => Ok(items),
        _ => Err(CliError::NotAnArray),
    }
}

/// Reference instant for relative date ranges; the local clock when absent.
///
/// Accepts a full timestamp or a bare date (midnight).
pub fn parse_now(now: Option<&str>) -> Result<NaiveDateTime, CliError> {
    let Some(raw) = now else {
        return Ok(Local::now().naive_local());
    };
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| CliError::InvalidNow(raw.to_string()))
}

pub fn statement_to_json(statement: &SqlStatement) -> JsonValue {
    json!({
        "sql": statement.sql,
        "params": statement.params_json(),
    })
}
