//! Error type shared by every stage of the engine.
//!
//! All failures are reported through [`DslError`]. Each variant carries a stable
//! symbolic code (see [`DslError::code`]) so callers can map errors onto their own
//! presentation without matching on message text.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DslError {
    // Grammar
    #[error("malformed query: {0}")]
    MalformedQuery(String),
    #[error("unsupported query fragment: '{0}'")]
    NotSupported(String),
    #[error("invalid comparison: {0}")]
    InvalidComparison(String),
    #[error("invalid in expression: {0}")]
    InvalidIn(String),
    #[error("invalid group: {0}")]
    InvalidGroup(String),
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("invalid is expression: {0}")]
    InvalidIsToken(String),
    #[error("invalid select: {0}")]
    InvalidSelect(String),
    #[error("invalid paging: {0}")]
    InvalidPaging(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid count flag: {0}")]
    InvalidShowCount(String),
    #[error("invalid metaInclude: {0}")]
    InvalidMetaInclude(String),
    #[error("invalid array operation: {0}")]
    InvalidArrayOperation(String),
    #[error("invalid nested filter: {0}")]
    InvalidNestedFilter(String),
    #[error("invalid sort: {0}")]
    InvalidSort(String),

    // Semantic
    #[error("field '{field}' is not {capability} on {entity}")]
    TokenFieldInvalid {
        entity: String,
        field: String,
        capability: &'static str,
    },
    #[error("operator '{operator}' is not supported on field '{field}' of type {field_type}")]
    UnsupportedComparison {
        field: String,
        operator: String,
        field_type: String,
    },
    #[error("column '{0}' is not sortable")]
    ColumnNotSortable(String),

    // Resource limits
    #[error("query nesting exceeds the maximum depth of {max}")]
    ExceededNesting { max: usize },
    #[error("requested {requested} items but at most {max} are allowed")]
    ExceededMaxItems { requested: u64, max: u64 },

    // Configuration
    #[error("configuration property '{0}' must be positive")]
    PropertyValueMustBePositive(&'static str),
    #[error("configuration property '{property}' is out of range: {reason}")]
    PropertyValueOutOfRange {
        property: &'static str,
        reason: String,
    },
}

/// Broad family an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Grammar,
    Semantic,
    ResourceLimit,
    Configuration,
}

impl DslError {
    /// Stable symbolic code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            DslError::MalformedQuery(_) => "MalformedQuery",
            DslError::NotSupported(_) => "NotSupported",
            DslError::InvalidComparison(_) => "InvalidComparison",
            DslError::InvalidIn(_) => "InvalidIn",
            DslError::InvalidGroup(_) => "InvalidGroup",
            DslError::InvalidDateRange(_) => "InvalidDateRange",
            DslError::InvalidIsToken(_) => "InvalidIsToken",
            DslError::InvalidSelect(_) => "InvalidSelect",
            DslError::InvalidPaging(_) => "InvalidPaging",
            DslError::InvalidLimit(_) => "InvalidLimit",
            DslError::InvalidShowCount(_) => "InvalidShowCount",
            DslError::InvalidMetaInclude(_) => "InvalidMetaInclude",
            DslError::InvalidArrayOperation(_) => "InvalidArrayOperation",
            DslError::InvalidNestedFilter(_) => "InvalidNestedFilter",
            DslError::InvalidSort(_) => "InvalidSort",
            DslError::TokenFieldInvalid { .. } => "TokenFieldInvalid",
            DslError::UnsupportedComparison { .. } => "UnsupportedComparison",
            DslError::ColumnNotSortable(_) => "ColumnNotSortable",
            DslError::ExceededNesting { .. } => "ExceededNesting",
            DslError::ExceededMaxItems { .. } => "ExceededMaxItems",
            DslError::PropertyValueMustBePositive(_) => "PropertyValueMustBePositive",
            DslError::PropertyValueOutOfRange { .. } => "PropertyValueOutOfRange",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DslError::TokenFieldInvalid { .. }
            | DslError::UnsupportedComparison { .. }
            | DslError::ColumnNotSortable(_) => ErrorCategory::Semantic,
            DslError::ExceededNesting { .. } | DslError::ExceededMaxItems { .. } => {
                ErrorCategory::ResourceLimit
            }
            DslError::PropertyValueMustBePositive(_) | DslError::PropertyValueOutOfRange { .. } => {
                ErrorCategory::Configuration
            }
            _ => ErrorCategory::Grammar,
        }
    }

    pub(crate) fn unsupported(field: &str, operator: impl Into<String>, field_type: impl ToString) -> Self {
        DslError::UnsupportedComparison {
            field: field.to_string(),
            operator: operator.into(),
            field_type: field_type.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DslError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_categories() {
        let err = DslError::MalformedQuery("x".into());
        assert_eq!(err.code(), "MalformedQuery");
        assert_eq!(err.category(), ErrorCategory::Grammar);

        let err = DslError::ExceededMaxItems { requested: 5000, max: 1000 };
        assert_eq!(err.code(), "ExceededMaxItems");
        assert_eq!(err.category(), ErrorCategory::ResourceLimit);
        assert_eq!(err.to_string(), "requested 5000 items but at most 1000 are allowed");

        let err = DslError::ColumnNotSortable("notes".into());
        assert_eq!(err.category(), ErrorCategory::Semantic);

        let err = DslError::PropertyValueMustBePositive("max_page_size");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
