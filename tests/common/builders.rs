//! Test data builders for schemas and records

use recordflow::{FieldDef, FieldType, Record, Schema, Value};
use std::sync::Arc;

/// Builder for test schemas
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl SchemaBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.push(FieldDef::new(name, field_type));
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(Schema::new(self.name, self.fields).expect("valid test schema"))
    }
}

/// `(id: integer, name: string)`, the layout most tests use.
pub fn id_name_schema() -> Arc<Schema> {
    SchemaBuilder::new("item")
        .field("id", FieldType::Integer)
        .field("name", FieldType::String)
        .build()
}

/// `(id, name)` records with `name` derived from `id`.
pub fn id_records(schema: &Arc<Schema>, ids: &[i32]) -> Vec<Record> {
    ids.iter()
        .map(|&id| {
            let mut record = Record::new(Arc::clone(schema));
            record.set(0, id).expect("id field");
            record.set(1, format!("item-{}", id)).expect("name field");
            record
        })
        .collect()
}

/// `(id, name)` records with explicit names.
pub fn named_records(schema: &Arc<Schema>, rows: &[(i32, &str)]) -> Vec<Record> {
    rows.iter()
        .map(|&(id, name)| {
            let mut record = Record::new(Arc::clone(schema));
            record.set(0, id).expect("id field");
            record.set(1, name).expect("name field");
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builder() {
        let schema = id_name_schema();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.index_of("name"), Some(1));
    }

    #[test]
    fn test_id_records() {
        let schema = id_name_schema();
        let rows = id_records(&schema, &[7]);
        assert_eq!(rows[0].get(1), Some(&Value::from("item-7")));
    }
}
