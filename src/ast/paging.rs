use crate::ast::{Annotations, SortDirection};

/// Sort field name that stands for the entity's key field.
pub const KEY_PLACEHOLDER: &str = "$key";

/// `select=f1,f2,…` or `select=*`
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub fields: Vec<String>,
    pub annotations: Annotations,
}

impl Select {
    pub fn new(fields: Vec<String>) -> Self {
        Select {
            fields,
            annotations: Annotations::default(),
        }
    }

    pub fn all() -> Self {
        Select::new(vec!["*".to_string()])
    }

    pub fn is_all(&self) -> bool {
        self.fields.iter().any(|f| f == "*")
    }
}

/// Keyset continuation value attached to a sort expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Value(String),
    /// `$null`
    Null,
    /// `$empty`
    Empty,
}

impl Cursor {
    pub fn parse(s: &str) -> Self {
        match s {
            "$null" => Cursor::Null,
            "$empty" => Cursor::Empty,
            other => Cursor::Value(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
    pub cursor: Option<Cursor>,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        SortField {
            field: field.into(),
            direction,
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn is_key_placeholder(&self) -> bool {
        self.field == KEY_PLACEHOLDER
    }
}

/// `sort(f.asc,g.desc.cursor,…)`
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub fields: Vec<SortField>,
    pub annotations: Annotations,
}

impl Sort {
    pub fn new(fields: Vec<SortField>) -> Self {
        Sort {
            fields,
            annotations: Annotations::default(),
        }
    }

    /// True when the sort carries keyset continuation values.
    pub fn has_cursor(&self) -> bool {
        self.fields.iter().any(|f| f.cursor.is_some())
    }

    /// True when the sort already orders by `key_field` or the key placeholder.
    pub fn orders_by_key(&self, key_field: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.is_key_placeholder() || f.field == key_field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub value: u64,
    pub annotations: Annotations,
}

impl Limit {
    pub fn new(value: u64) -> Self {
        Limit {
            value,
            annotations: Annotations::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShowCount {
    pub value: bool,
    pub annotations: Annotations,
}

impl ShowCount {
    pub fn new(value: bool) -> Self {
        ShowCount {
            value,
            annotations: Annotations::default(),
        }
    }
}

/// `paging=(sort(…),limit.N,count.bool)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paging {
    pub sort: Option<Sort>,
    pub limit: Option<Limit>,
    pub show_count: Option<ShowCount>,
    pub annotations: Annotations,
}

impl Paging {
    pub fn show_count(&self) -> bool {
        self.show_count.as_ref().is_some_and(|c| c.value)
    }

    /// Only a count was asked for; no rows need fetching.
    pub fn is_count_only(&self) -> bool {
        self.sort.is_none() && self.limit.is_none() && self.show_count()
    }
}

/// `metaInclude=filters,columns,subscriptions`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaInclude {
    pub filters: bool,
    pub columns: bool,
    pub subscriptions: bool,
    pub annotations: Annotations,
}
