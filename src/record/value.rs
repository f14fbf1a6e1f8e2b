//! Field types and field values.
//!
//! A [`Value`] is the content of one record slot. `Null` is a value of every
//! type; the remaining variants correspond one-to-one to [`FieldType`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Long,
    Number,
    /// UTC timestamp with millisecond precision
    Date,
    Boolean,
    Bytes,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Bytes => "bytes",
        }
    }

    /// Width of the serialized form, `None` for variable-length types.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Integer => Some(4),
            FieldType::Long | FieldType::Number | FieldType::Date => Some(8),
            FieldType::Boolean => Some(1),
            FieldType::String | FieldType::Bytes => None,
        }
    }

    /// Value used when a non-nullable field has no declared default.
    pub fn zero_value(self) -> Value {
        match self {
            FieldType::String => Value::String(String::new()),
            FieldType::Integer => Value::Integer(0),
            FieldType::Long => Value::Long(0),
            FieldType::Number => Value::Number(0.0),
            FieldType::Date => Value::Date(DateTime::<Utc>::UNIX_EPOCH),
            FieldType::Boolean => Value::Boolean(false),
            FieldType::Bytes => Value::Bytes(Vec::new()),
        }
    }

    /// Parse the textual form of a value of this type.
    ///
    /// `format` is a chrono format string for dates; without one, RFC 3339
    /// timestamps and plain `YYYY-MM-DD` dates are accepted.
    pub fn parse_text(self, text: &str, format: Option<&str>) -> Result<Value, String> {
        let trimmed = text.trim();
        match self {
            FieldType::String => Ok(Value::String(text.to_string())),
            FieldType::Integer => trimmed
                .parse::<i32>()
                .map(Value::Integer)
                .map_err(|e| format!("'{}' is not an integer: {}", text, e)),
            FieldType::Long => trimmed
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|e| format!("'{}' is not a long: {}", text, e)),
            FieldType::Number => trimmed
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|e| format!("'{}' is not a number: {}", text, e)),
            FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "no" | "n" | "0" => Ok(Value::Boolean(false)),
                _ => Err(format!("'{}' is not a boolean", text)),
            },
            FieldType::Bytes => Ok(Value::Bytes(text.as_bytes().to_vec())),
            FieldType::Date => parse_date(trimmed, format).map(Value::date),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_date(text: &str, format: Option<&str>) -> Result<DateTime<Utc>, String> {
    match format {
        Some(fmt) => NaiveDateTime::parse_from_str(text, fmt)
            .or_else(|_| {
                NaiveDate::parse_from_str(text, fmt)
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
            })
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|e| format!("'{}' does not match date format '{}': {}", text, fmt, e)),
        None => DateTime::parse_from_rfc3339(text)
            .map(|d| d.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(|d| Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap_or_default()))
            })
            .map_err(|e| format!("'{}' is not a date: {}", text, e)),
    }
}

/// Content of one record slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Integer(i32),
    Long(i64),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
    Bytes(Vec<u8>),
}

impl Value {
    /// Date value truncated to the millisecond precision records carry.
    pub fn date(value: DateTime<Utc>) -> Value {
        let millis = value.timestamp_millis();
        Value::Date(DateTime::from_timestamp_millis(millis).unwrap_or(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type of a non-null value.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(FieldType::String),
            Value::Integer(_) => Some(FieldType::Integer),
            Value::Long(_) => Some(FieldType::Long),
            Value::Number(_) => Some(FieldType::Number),
            Value::Date(_) => Some(FieldType::Date),
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::Bytes(_) => Some(FieldType::Bytes),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.field_type().map(FieldType::name).unwrap_or("null")
    }

    /// Convert into `target`, allowing only lossless numeric widening.
    ///
    /// On failure the original value is handed back.
    pub fn coerce(self, target: FieldType) -> Result<Value, Value> {
        match (self, target) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Integer(v), FieldType::Long) => Ok(Value::Long(v as i64)),
            (Value::Integer(v), FieldType::Number) => Ok(Value::Number(v as f64)),
            (Value::Long(v), FieldType::Number) => Ok(Value::Number(v as f64)),
            (Value::Date(d), FieldType::Date) => Ok(Value::date(d)),
            (v, t) if v.field_type() == Some(t) => Ok(v),
            (v, _) => Err(v),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Raw bytes of a string or byte value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Natural ordering of two non-null values of the same type.
    ///
    /// Numbers use IEEE total order so NaN has a fixed position. Values of
    /// different types fall back to ordering by type.
    pub fn natural_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::String(_) => 1,
            Value::Integer(_) => 2,
            Value::Long(_) => 3,
            Value::Number(_) => 4,
            Value::Date(_) => 5,
            Value::Boolean(_) => 6,
            Value::Bytes(_) => 7,
        }
    }

    /// Textual form, the inverse of [`FieldType::parse_text`].
    pub fn to_text(&self, format: Option<&str>) -> String {
        match (self, format) {
            (Value::Date(d), Some(fmt)) => d.format(fmt).to_string(),
            (Value::Date(d), None) => d.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            (Value::Bytes(b), _) => String::from_utf8_lossy(b).into_owned(),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Number(v) => write!(f, "{}", v),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_coercion() {
        assert_eq!(Value::Integer(7).coerce(FieldType::Long), Ok(Value::Long(7)));
        assert_eq!(
            Value::Long(7).coerce(FieldType::Number),
            Ok(Value::Number(7.0))
        );
        assert!(Value::Number(1.5).coerce(FieldType::Integer).is_err());
        assert!(Value::from("x").coerce(FieldType::Integer).is_err());
        assert_eq!(Value::Null.coerce(FieldType::Date), Ok(Value::Null));
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(
            FieldType::Integer.parse_text(" 42 ", None),
            Ok(Value::Integer(42))
        );
        assert_eq!(
            FieldType::Boolean.parse_text("Yes", None),
            Ok(Value::Boolean(true))
        );
        assert!(FieldType::Long.parse_text("4x", None).is_err());

        let date = FieldType::Date.parse_text("2024-02-29", None).unwrap();
        assert_eq!(date.to_text(Some("%Y/%m/%d")), "2024/02/29");

        let custom = FieldType::Date
            .parse_text("29.02.2024 13:05:00", Some("%d.%m.%Y %H:%M:%S"))
            .unwrap();
        assert_eq!(custom.to_text(Some("%H:%M")), "13:05");
    }

    #[test]
    fn test_date_truncated_to_millis() {
        let precise = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let v = Value::date(precise);
        match v {
            Value::Date(d) => assert_eq!(d.timestamp_subsec_nanos(), 123_000_000),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(
            Value::Number(f64::NAN).natural_cmp(&Value::Number(1.0)),
            Ordering::Greater
        );
        assert_eq!(Value::from("b").natural_cmp(&Value::from("a")), Ordering::Greater);
        assert_eq!(Value::Integer(3).natural_cmp(&Value::Integer(3)), Ordering::Equal);
    }
}
