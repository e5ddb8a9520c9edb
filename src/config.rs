//! Engine configuration.
//!
//! The configuration is established once before any query is processed and is
//! read-only afterwards. [`install`] replaces the process-wide instance wholesale;
//! components that are handed an explicit `Arc<EngineConfig>` never touch the
//! global one.

use std::sync::Arc;

use chrono::Weekday;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DslError, Result};

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDialect {
    /// `ILIKE`, `LIMIT`, `->>` JSON access, native arrays.
    #[default]
    Postgres,
    /// `LIKE`, `OFFSET … FETCH NEXT`, `JSON_VALUE`/`OPENJSON`.
    SqlServer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deepest nesting level a query may reach (level 1 is the top level).
    pub max_nesting_depth: usize,
    /// Page size used when a query does not ask for one.
    pub default_page_size: u64,
    /// Largest page size a caller may request explicitly.
    pub max_page_size: u64,
    /// Page size forced when the caller asks to ignore the limit.
    pub max_safe_count: u64,
    pub dialect: DatabaseDialect,
    /// First day of the week for week snapping in date ranges.
    pub week_start: Weekday,
    /// Upper bound for a date range's approximate span in days.
    pub max_date_range_days: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_nesting_depth: 5,
            default_page_size: 50,
            max_page_size: 1000,
            max_safe_count: 1_000_000,
            dialect: DatabaseDialect::Postgres,
            week_start: Weekday::Mon,
            max_date_range_days: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(DslError::PropertyValueMustBePositive("max_nesting_depth"));
        }
        if self.default_page_size == 0 {
            return Err(DslError::PropertyValueMustBePositive("default_page_size"));
        }
        if self.max_page_size == 0 {
            return Err(DslError::PropertyValueMustBePositive("max_page_size"));
        }
        if self.max_safe_count == 0 {
            return Err(DslError::PropertyValueMustBePositive("max_safe_count"));
        }
        if self.max_date_range_days == Some(0) {
            return Err(DslError::PropertyValueMustBePositive("max_date_range_days"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(DslError::PropertyValueOutOfRange {
                property: "default_page_size",
                reason: format!(
                    "{} exceeds max_page_size {}",
                    self.default_page_size, self.max_page_size
                ),
            });
        }
        if self.max_safe_count < self.max_page_size {
            return Err(DslError::PropertyValueOutOfRange {
                property: "max_safe_count",
                reason: format!(
                    "{} is below max_page_size {}",
                    self.max_safe_count, self.max_page_size
                ),
            });
        }
        Ok(())
    }

    /// Parse a JSON configuration document; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| DslError::PropertyValueOutOfRange {
                property: "config",
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_dialect(mut self, dialect: DatabaseDialect) -> Self {
        self.dialect = dialect;
        self
    }
}

static CURRENT: Lazy<RwLock<Arc<EngineConfig>>> =
    Lazy::new(|| RwLock::new(Arc::new(EngineConfig::default())));

/// Validate `config` and make it the process-wide configuration.
pub fn install(config: EngineConfig) -> Result<()> {
    config.validate()?;
    debug!(target: "sieve::config", ?config, "installing engine configuration");
    *CURRENT.write() = Arc::new(config);
    Ok(())
}

/// The process-wide configuration.
pub fn current() -> Arc<EngineConfig> {
    CURRENT.read().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_and_inverted_limits() {
        let config = EngineConfig {
            max_page_size: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(DslError::PropertyValueMustBePositive("max_page_size"))
        );

        let config = EngineConfig {
            default_page_size: 2000,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "PropertyValueOutOfRange");
    }

    #[test]
    fn parses_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{"dialect": "sqlserver", "max_page_size": 200, "week_start": "Sun"}"#,
        )
        .unwrap();
        assert_eq!(config.dialect, DatabaseDialect::SqlServer);
        assert_eq!(config.max_page_size, 200);
        assert_eq!(config.week_start, Weekday::Sun);
        assert_eq!(config.default_page_size, 50);
    }

    #[test]
    fn install_replaces_instance() {
        let before = current();
        install(EngineConfig {
            max_nesting_depth: 7,
            ..EngineConfig::default()
        })
        .unwrap();
        assert_eq!(current().max_nesting_depth, 7);
        assert!(install(EngineConfig {
            max_nesting_depth: 0,
            ..EngineConfig::default()
        })
        .is_err());
        assert_eq!(current().max_nesting_depth, 7);
        install((*before).clone()).unwrap();
    }
}
