//! The metadata contract the engine consumes.
//!
//! The engine never inspects host types. Everything it needs to know about an
//! entity comes through [`EntityMetadata`]: field capabilities and types, storage
//! columns, nullability and the key field.
//! [`EntitySchema`] is a ready-made implementation that can be built in code or
//! loaded from JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primitive type of a field as far as filtering is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Timestamp,
    Date,
    Uuid,
    /// Native array column of the given element type
    Array(Box<FieldType>),
    /// Embedded JSON object
    Json,
    /// Embedded JSON array (of objects or scalars)
    JsonArray,
}

static JSON_ELEMENT: FieldType = FieldType::Text;

impl FieldType {
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::Text)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Timestamp | FieldType::Date)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldType::Array(_) | FieldType::JsonArray)
    }

    pub fn is_json(&self) -> bool {
        matches!(self, FieldType::Json | FieldType::JsonArray)
    }

    /// Element type of a collection; JSON arrays hold text.
    pub fn element_type(&self) -> Option<&FieldType> {
        match self {
            FieldType::Array(element) => Some(element),
            FieldType::JsonArray => Some(&JSON_ELEMENT),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Decimal => write!(f, "decimal"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Date => write!(f, "date"),
            FieldType::Uuid => write!(f, "uuid"),
            FieldType::Array(element) => write!(f, "{element}[]"),
            FieldType::Json => write!(f, "json"),
            FieldType::JsonArray => write!(f, "jsonArray"),
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(element) = s.strip_suffix("[]") {
            return Ok(FieldType::Array(Box::new(element.parse()?)));
        }
        Ok(match s {
            "text" | "string" => FieldType::Text,
            "integer" | "int" => FieldType::Integer,
            "decimal" | "number" => FieldType::Decimal,
            "boolean" | "bool" => FieldType::Boolean,
            "timestamp" | "datetime" => FieldType::Timestamp,
            "date" => FieldType::Date,
            "uuid" => FieldType::Uuid,
            "json" => FieldType::Json,
            "jsonArray" => FieldType::JsonArray,
            other => return Err(format!("unknown field type '{other}'")),
        })
    }
}

impl TryFrom<String> for FieldType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

fn yes() -> bool {
    true
}

/// Everything the engine knows about one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub name: String,
    /// Storage column; defaults to the field name
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "yes")]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default = "yes")]
    pub selectable: bool,
    #[serde(default = "yes")]
    pub nullable: bool,
    /// Column needs accent folding before comparison
    #[serde(default)]
    pub normalize: bool,
    /// Sub-fields of a JSON column
    #[serde(default)]
    pub fields: Vec<FieldMetadata>,
}

impl FieldMetadata {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldMetadata {
            name: name.into(),
            column: None,
            field_type,
            filterable: true,
            sortable: false,
            selectable: true,
            nullable: true,
            normalize: false,
            fields: Vec::new(),
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    pub fn not_selectable(mut self) -> Self {
        self.selectable = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn normalized(mut self) -> Self {
        self.normalize = true;
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldMetadata>) -> Self {
        self.fields = fields;
        self
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn sub_field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Read-only lookup of entity metadata.
///
/// `path` is the JSON scope of the reference (empty for table columns); see
/// [`crate::ast::Annotations::json_path`].
pub trait EntityMetadata: Send + Sync {
    fn entity_name(&self) -> &str;

    /// Table or view rows are read from.
    fn source(&self) -> &str;

    fn key_field(&self) -> &str;

    /// Top-level fields in declaration order.
    fn fields(&self) -> &[FieldMetadata];

    fn field(&self, path: &[String], name: &str) -> Option<&FieldMetadata> {
        let mut scope = self.fields();
        for segment in path {
            scope = &scope.iter().find(|f| &f.name == segment)?.fields;
        }
        scope.iter().find(|f| f.name == name)
    }

    fn is_filterable(&self, path: &[String], name: &str) -> bool {
        self.field(path, name).is_some_and(|f| f.filterable)
    }

    fn is_sortable(&self, name: &str) -> bool {
        self.field(&[], name).is_some_and(|f| f.sortable)
    }

    fn is_selectable(&self, name: &str) -> bool {
        self.field(&[], name).is_some_and(|f| f.selectable)
    }

    fn field_type(&self, path: &[String], name: &str) -> Option<&FieldType> {
        self.field(path, name).map(|f| &f.field_type)
    }
}

/// In-code or JSON-loaded description of one entity.
///
/// # Example
///
/// ```
/// use sieve_query::metadata::{EntityMetadata, EntitySchema, FieldMetadata, FieldType};
///
/// let schema = EntitySchema::new("order", "orders", "id")
///     .field(FieldMetadata::new("id", FieldType::Integer).sortable().required())
///     .field(FieldMetadata::new("name", FieldType::Text).sortable());
/// assert!(schema.is_sortable("name"));
/// assert!(!schema.is_filterable(&[], "missing"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity: String,
    pub source: String,
    pub key: String,
    pub fields: Vec<FieldMetadata>,
}

impl EntitySchema {
    pub fn new(entity: impl Into<String>, source: impl Into<String>, key: impl Into<String>) -> Self {
        EntitySchema {
            entity: entity.into(),
            source: source.into(),
            key: key.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldMetadata) -> Self {
        self.fields.push(field);
        self
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl EntityMetadata for EntitySchema {
    fn entity_name(&self) -> &str {
        &self.entity
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn key_field(&self) -> &str {
        &self.key
    }

    fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }
}
