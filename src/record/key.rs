//! Composite record keys.
//!
//! A key is an ordered subset of a schema's fields, each with a sort order.
//! Key specs are written as `;`-separated field names with an optional order
//! suffix: `"customer;placed(d);id(a)"`.

use crate::error::{FlowError, Result};
use crate::record::collation::{Collation, Collator};
use crate::record::comparator::compare_values;
use crate::record::record::Record;
use crate::record::schema::Schema;
use crate::record::value::Value;
use crate::record::varint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Direction of one key part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    #[inline]
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

/// One resolved field of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPart {
    pub name: String,
    pub index: usize,
    pub order: SortOrder,
}

/// Ordered list of key fields bound to one schema.
///
/// Built once at component init and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct RecordKey {
    schema: Arc<Schema>,
    parts: Vec<KeyPart>,
    equal_nulls: bool,
    collation: Option<Arc<dyn Collation>>,
}

impl RecordKey {
    /// Build an ascending key over the named fields.
    pub fn new(schema: Arc<Schema>, names: &[&str]) -> Result<Self> {
        let spec: Vec<(String, SortOrder)> = names
            .iter()
            .map(|n| (n.to_string(), SortOrder::Ascending))
            .collect();
        Self::from_parts(schema, spec)
    }

    /// Build a key from a spec such as `"a;b(d)"`.
    pub fn parse(schema: Arc<Schema>, spec: &str) -> Result<Self> {
        Self::from_parts(schema, parse_key_spec(spec)?)
    }

    fn from_parts(schema: Arc<Schema>, spec: Vec<(String, SortOrder)>) -> Result<Self> {
        if spec.is_empty() {
            return Err(FlowError::Configuration(format!(
                "Empty key for schema '{}'",
                schema.name()
            )));
        }

        let parts = spec
            .into_iter()
            .map(|(name, order)| {
                let index = schema.require_index(&name)?;
                Ok(KeyPart { name, index, order })
            })
            .collect::<Result<Vec<_>>>()?;

        let collation = match schema.locale() {
            Some(locale) => Some(Arc::new(Collator::for_locale(locale)?) as Arc<dyn Collation>),
            None => None,
        };

        Ok(Self {
            schema,
            parts,
            equal_nulls: true,
            collation,
        })
    }

    /// Whether two NULLs compare equal (default `true`).
    pub fn with_equal_nulls(mut self, equal_nulls: bool) -> Self {
        self.equal_nulls = equal_nulls;
        self
    }

    /// Use the built-in collator for `locale` on string parts.
    pub fn with_locale(self, locale: &str) -> Result<Self> {
        Ok(self.with_collation(Arc::new(Collator::for_locale(locale)?)))
    }

    pub fn with_collation(mut self, collation: Arc<dyn Collation>) -> Self {
        self.collation = Some(collation);
        self
    }

    /// Override the order of every part.
    pub fn with_order(mut self, order: SortOrder) -> Self {
        for part in &mut self.parts {
            part.order = order;
        }
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn equal_nulls(&self) -> bool {
        self.equal_nulls
    }

    pub(crate) fn collation(&self) -> Option<&dyn Collation> {
        self.collation.as_deref()
    }

    /// Compare two records of this key's schema.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for part in &self.parts {
            let ord = compare_values(
                a.value_at(part.index),
                b.value_at(part.index),
                part.order,
                self.equal_nulls,
                self.collation(),
            );
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn equals(&self, a: &Record, b: &Record) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Key values of a record, in key order.
    pub fn values<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = &'a Value> + 'a {
        self.parts.iter().map(move |p| record.value_at(p.index))
    }

    /// Append a byte encoding of the key fields to `out`.
    ///
    /// Records that are equal under this key (ignoring collation) produce
    /// identical bytes, which makes the encoding usable as a hash key.
    pub fn serialize_key(&self, record: &Record, out: &mut Vec<u8>) {
        for value in self.values(record) {
            match value {
                Value::Null => out.push(0),
                Value::String(s) => {
                    out.push(1);
                    varint::put_varint(out, s.len() as u64);
                    out.extend_from_slice(s.as_bytes());
                }
                Value::Integer(v) => {
                    out.push(2);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Value::Long(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Value::Number(v) => {
                    out.push(4);
                    out.extend_from_slice(&v.to_bits().to_be_bytes());
                }
                Value::Date(d) => {
                    out.push(5);
                    out.extend_from_slice(&d.timestamp_millis().to_be_bytes());
                }
                Value::Boolean(b) => out.extend_from_slice(&[6, *b as u8]),
                Value::Bytes(b) => {
                    out.push(7);
                    varint::put_varint(out, b.len() as u64);
                    out.extend_from_slice(b);
                }
            }
        }
    }

    /// Whether any key field of `record` is NULL.
    pub fn has_null(&self, record: &Record) -> bool {
        self.values(record).any(Value::is_null)
    }
}

/// Parse `"a;b(d);c(a)"` into field names and orders.
pub fn parse_key_spec(spec: &str) -> Result<Vec<(String, SortOrder)>> {
    spec.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.find('(') {
            None => Ok((item.to_string(), SortOrder::Ascending)),
            Some(open) => {
                let name = item[..open].trim();
                let suffix = item[open + 1..].strip_suffix(')').ok_or_else(|| {
                    FlowError::Configuration(format!("Unterminated order in key part '{}'", item))
                })?;
                let order = match suffix.trim() {
                    "a" | "A" => SortOrder::Ascending,
                    "d" | "D" => SortOrder::Descending,
                    other => {
                        return Err(FlowError::Configuration(format!(
                            "Unknown sort order '{}' in key part '{}'",
                            other, item
                        )))
                    }
                };
                Ok((name.to_string(), order))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::schema::FieldDef;
    use crate::record::value::FieldType;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(
                "orders",
                vec![
                    FieldDef::new("customer", FieldType::String),
                    FieldDef::new("amount", FieldType::Number),
                    FieldDef::new("id", FieldType::Long),
                ],
            )
            .unwrap(),
        )
    }

    fn order(customer: &str, amount: f64, id: i64) -> Record {
        let mut r = Record::new(schema());
        r.set(0, customer).unwrap();
        r.set(1, amount).unwrap();
        r.set(2, id).unwrap();
        r
    }

    #[test]
    fn test_parse_key_spec() {
        let parts = parse_key_spec("customer; amount(d) ;id(a)").unwrap();
        assert_eq!(
            parts,
            vec![
                ("customer".to_string(), SortOrder::Ascending),
                ("amount".to_string(), SortOrder::Descending),
                ("id".to_string(), SortOrder::Ascending),
            ]
        );
        assert!(parse_key_spec("a(x)").is_err());
        assert!(parse_key_spec("a(d").is_err());
    }

    #[test]
    fn test_unknown_field_is_configuration_error() {
        let err = RecordKey::parse(schema(), "customer;nope").unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_multi_part_compare() {
        let key = RecordKey::parse(schema(), "customer;amount(d)").unwrap();
        let a = order("acme", 10.0, 1);
        let b = order("acme", 5.0, 2);
        let c = order("zeta", 50.0, 3);
        assert_eq!(key.compare(&a, &b), Ordering::Less);
        assert_eq!(key.compare(&b, &c), Ordering::Less);
        assert_eq!(key.compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_serialize_key_groups_equal_keys() {
        let key = RecordKey::new(schema(), &["customer"]).unwrap();
        let (mut x, mut y, mut z) = (Vec::new(), Vec::new(), Vec::new());
        key.serialize_key(&order("acme", 1.0, 1), &mut x);
        key.serialize_key(&order("acme", 2.0, 2), &mut y);
        key.serialize_key(&order("acm", 1.0, 1), &mut z);
        assert_eq!(x, y);
        assert_ne!(x, z);
    }
}
