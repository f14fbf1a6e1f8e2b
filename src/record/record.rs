//! Schema-bound, reusable records.
//!
//! # Binary layout
//!
//! ```text
//! [null bitmap: ceil(n/8) bytes, bit i set = field i is NULL]
//! [field 0][field 1]...            (non-null fields only)
//!
//! integer        4 bytes big-endian
//! long / number  8 bytes big-endian
//! date           8 bytes big-endian, milliseconds since the epoch
//! boolean        1 byte (0 or 1)
//! string / bytes varint length + payload
//! ```

use crate::error::{FlowError, Result};
use crate::record::schema::Schema;
use crate::record::value::{FieldType, Value};
use crate::record::varint;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::DateTime;
use std::fmt;
use std::sync::Arc;

/// One row of a stream.
///
/// Records are meant to be reused: populate, hand off, [`reset`](Record::reset).
/// A record is owned by one thread at a time.
#[derive(Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    /// Allocate a record with every field at its default.
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = (0..schema.len())
            .map(|i| schema.default_value(i).clone())
            .collect();
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Slot access for positions already validated against the schema.
    pub(crate) fn value_at(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).map(Value::is_null).unwrap_or(true)
    }

    /// Store a value, widening numbers where lossless.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let field = self.schema.field(index).ok_or_else(|| {
            FlowError::Configuration(format!(
                "Field index {} out of range for schema '{}'",
                index,
                self.schema.name()
            ))
        })?;
        let value = value.into();

        if value.is_null() && !field.nullable {
            return Err(FlowError::TypeMismatch {
                field: field.name.clone(),
                expected: format!("non-null {}", field.field_type),
                found: "null".to_string(),
            });
        }

        let coerced = value
            .coerce(field.field_type)
            .map_err(|v| FlowError::TypeMismatch {
                field: field.name.clone(),
                expected: field.field_type.to_string(),
                found: v.type_name().to_string(),
            })?;
        self.values[index] = coerced;
        Ok(())
    }

    pub fn set_by_name(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.schema.require_index(name)?;
        self.set(index, value)
    }

    /// Set a field to NULL.
    pub fn set_null(&mut self, index: usize) -> Result<()> {
        self.set(index, Value::Null)
    }

    /// Restore one field to its declared default.
    pub fn reset_field(&mut self, index: usize) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = self.schema.default_value(index).clone();
        }
    }

    /// Restore every field to its declared default for reuse.
    pub fn reset(&mut self) {
        for (i, slot) in self.values.iter_mut().enumerate() {
            *slot = self.schema.default_value(i).clone();
        }
    }

    /// Copy all values from a record with a compatible layout.
    pub fn copy_from(&mut self, other: &Record) -> Result<()> {
        if !Arc::ptr_eq(&self.schema, &other.schema) && !self.schema.is_compatible(&other.schema)
        {
            return Err(FlowError::Configuration(format!(
                "Cannot copy record of schema '{}' into schema '{}'",
                other.schema.name(),
                self.schema.name()
            )));
        }
        self.values.clone_from(&other.values);
        Ok(())
    }

    /// Copy fields that exist under the same name in both records.
    pub fn copy_by_name(&mut self, other: &Record) -> Result<()> {
        for (i, field) in other.schema.fields().iter().enumerate() {
            if let Some(target) = self.schema.index_of(&field.name) {
                self.set(target, other.values[i].clone())?;
            }
        }
        Ok(())
    }

    /// Deep copy sharing the schema reference.
    pub fn duplicate(&self) -> Record {
        self.clone()
    }

    fn bitmap_len(&self) -> usize {
        self.values.len().div_ceil(8)
    }

    /// Exact number of bytes [`serialize`](Record::serialize) writes.
    pub fn serialized_size(&self) -> usize {
        let mut size = self.bitmap_len();
        for value in &self.values {
            size += match value {
                Value::Null => 0,
                Value::Integer(_) => 4,
                Value::Long(_) | Value::Number(_) | Value::Date(_) => 8,
                Value::Boolean(_) => 1,
                Value::String(s) => varint::encoded_len(s.len() as u64) + s.len(),
                Value::Bytes(b) => varint::encoded_len(b.len() as u64) + b.len(),
            };
        }
        size
    }

    pub fn serialize(&self, buf: &mut impl BufMut) -> Result<()> {
        let needed = self.serialized_size();
        if buf.remaining_mut() < needed {
            return Err(FlowError::BufferOverflow {
                needed,
                available: buf.remaining_mut(),
            });
        }

        let mut bitmap = vec![0u8; self.bitmap_len()];
        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        buf.put_slice(&bitmap);

        for value in &self.values {
            match value {
                Value::Null => {}
                Value::Integer(v) => buf.put_i32(*v),
                Value::Long(v) => buf.put_i64(*v),
                Value::Number(v) => buf.put_f64(*v),
                Value::Date(d) => buf.put_i64(d.timestamp_millis()),
                Value::Boolean(b) => buf.put_u8(*b as u8),
                Value::String(s) => {
                    varint::put_varint(buf, s.len() as u64);
                    buf.put_slice(s.as_bytes());
                }
                Value::Bytes(b) => {
                    varint::put_varint(buf, b.len() as u64);
                    buf.put_slice(b);
                }
            }
        }
        Ok(())
    }

    /// Serialize into a fresh immutable buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.serialized_size());
        self.serialize(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Overwrite this record with the values encoded in `buf`.
    pub fn deserialize(&mut self, buf: &mut impl Buf) -> Result<()> {
        let bitmap_len = self.bitmap_len();
        ensure_remaining(buf, bitmap_len)?;
        let mut bitmap = vec![0u8; bitmap_len];
        buf.copy_to_slice(&mut bitmap);

        let schema = Arc::clone(&self.schema);
        for (i, field) in schema.fields().iter().enumerate() {
            if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                if !field.nullable {
                    return Err(FlowError::malformed(
                        format!("field '{}'", field.name),
                        "NULL in a non-nullable field",
                    ));
                }
                self.values[i] = Value::Null;
                continue;
            }

            self.values[i] = match field.field_type {
                FieldType::Integer => {
                    ensure_remaining(buf, 4)?;
                    Value::Integer(buf.get_i32())
                }
                FieldType::Long => {
                    ensure_remaining(buf, 8)?;
                    Value::Long(buf.get_i64())
                }
                FieldType::Number => {
                    ensure_remaining(buf, 8)?;
                    Value::Number(buf.get_f64())
                }
                FieldType::Date => {
                    ensure_remaining(buf, 8)?;
                    let millis = buf.get_i64();
                    let date = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                        FlowError::malformed(
                            format!("field '{}'", field.name),
                            format!("timestamp {} out of range", millis),
                        )
                    })?;
                    Value::Date(date)
                }
                FieldType::Boolean => {
                    ensure_remaining(buf, 1)?;
                    match buf.get_u8() {
                        0 => Value::Boolean(false),
                        1 => Value::Boolean(true),
                        other => {
                            return Err(FlowError::malformed(
                                format!("field '{}'", field.name),
                                format!("invalid boolean byte {}", other),
                            ))
                        }
                    }
                }
                FieldType::String => {
                    let bytes = get_payload(buf)?;
                    let text = String::from_utf8(bytes).map_err(|e| {
                        FlowError::malformed(format!("field '{}'", field.name), e.to_string())
                    })?;
                    Value::String(text)
                }
                FieldType::Bytes => Value::Bytes(get_payload(buf)?),
            };
        }
        Ok(())
    }
}

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(FlowError::BufferOverflow {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn get_payload(buf: &mut impl Buf) -> Result<Vec<u8>> {
    let len = varint::get_varint(buf).ok_or(FlowError::BufferOverflow {
        needed: 1,
        available: 0,
    })? as usize;
    ensure_remaining(buf, len)?;
    let mut payload = vec![0u8; len];
    buf.copy_to_slice(&mut payload);
    Ok(payload)
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (field, value) in self.schema.fields().iter().zip(&self.values) {
            map.entry(&field.name, value);
        }
        map.finish()
    }
}
