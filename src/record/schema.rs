//! Record schemas.
//!
//! A [`Schema`] is an ordered list of named, typed fields. It is immutable once
//! built and shared by reference (`Arc<Schema>`) across every record of a
//! stream. Schemas can be declared in code or loaded from JSON/TOML:
//!
//! ```toml
//! name = "orders"
//!
//! [[fields]]
//! name = "id"
//! type = "long"
//! nullable = false
//!
//! [[fields]]
//! name = "placed"
//! type = "date"
//! format = "%Y-%m-%d"
//! ```

use crate::error::{FlowError, Result};
use crate::record::value::{FieldType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_nullable() -> bool {
    true
}

/// Declaration of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Textual default, parsed with the field's type and format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Date format used by text codecs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
            default: None,
            format: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

#[derive(Serialize, Deserialize)]
struct SchemaDef {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locale: Option<String>,
    fields: Vec<FieldDef>,
}

/// Ordered list of named, typed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
    name: String,
    locale: Option<String>,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    defaults: Vec<Value>,
}

impl Schema {
    /// Build a schema, validating field names and declared defaults.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        let name = name.into();
        let mut index = HashMap::with_capacity(fields.len());
        let mut defaults = Vec::with_capacity(fields.len());

        for (i, field) in fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(FlowError::Configuration(format!(
                    "Field {} of schema '{}' has no name",
                    i, name
                )));
            }
            if index.insert(field.name.clone(), i).is_some() {
                return Err(FlowError::Configuration(format!(
                    "Duplicate field '{}' in schema '{}'",
                    field.name, name
                )));
            }

            let default = match &field.default {
                Some(text) => field
                    .field_type
                    .parse_text(text, field.format.as_deref())
                    .map_err(|e| {
                        FlowError::Configuration(format!(
                            "Invalid default for field '{}' in schema '{}': {}",
                            field.name, name, e
                        ))
                    })?,
                None if field.nullable => Value::Null,
                None => field.field_type.zero_value(),
            };
            defaults.push(default);
        }

        Ok(Self {
            name,
            locale: None,
            fields,
            index,
            defaults,
        })
    }

    /// Locale used for string collation by keys built on this schema.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&FieldDef> {
        self.fields.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Position of a field, or a configuration error naming the schema.
    pub fn require_index(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| {
            FlowError::Configuration(format!(
                "Field '{}' not found in schema '{}'",
                name, self.name
            ))
        })
    }

    /// Value a slot takes after `Record::reset`.
    pub fn default_value(&self, index: usize) -> &Value {
        &self.defaults[index]
    }

    /// Whether records of `other` have the same layout as records of `self`.
    pub fn is_compatible(&self, other: &Schema) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.field_type == b.field_type)
    }

    /// Load a schema from a `.json` or `.toml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!("Failed to read schema file {:?}: {}", path, e))
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            toml::from_str(&content).map_err(|e| {
                FlowError::Configuration(format!("Failed to parse schema file {:?}: {}", path, e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                FlowError::Configuration(format!("Failed to parse schema file {:?}: {}", path, e))
            })
        }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.locale == other.locale && self.fields == other.fields
    }
}

impl TryFrom<SchemaDef> for Schema {
    type Error = FlowError;

    fn try_from(def: SchemaDef) -> Result<Self> {
        let schema = Schema::new(def.name, def.fields)?;
        Ok(match def.locale {
            Some(locale) => schema.with_locale(locale),
            None => schema,
        })
    }
}

impl From<Schema> for SchemaDef {
    fn from(schema: Schema) -> Self {
        SchemaDef {
            name: schema.name,
            locale: schema.locale,
            fields: schema.fields,
        }
    }
}
