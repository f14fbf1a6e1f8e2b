//! Record comparison.
//!
//! NULL sorts below every non-null value. When a key does not treat NULLs as
//! equal, two NULLs compare `Less`, so no two NULL-keyed records are ever
//! considered duplicates.

use crate::error::{FlowError, Result};
use crate::record::collation::Collation;
use crate::record::key::{RecordKey, SortOrder};
use crate::record::record::Record;
use crate::record::value::Value;
use std::cmp::Ordering;

/// Compare two field values under one key part's rules.
#[inline]
pub fn compare_values(
    a: &Value,
    b: &Value,
    order: SortOrder,
    equal_nulls: bool,
    collation: Option<&dyn Collation>,
) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => {
            if equal_nulls {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
        (Value::Null, _) => order.apply(Ordering::Less),
        (_, Value::Null) => order.apply(Ordering::Greater),
        (Value::String(x), Value::String(y)) => match collation {
            Some(c) => order.apply(c.compare(x, y)),
            None => order.apply(x.cmp(y)),
        },
        (x, y) => order.apply(x.natural_cmp(y)),
    }
}

/// Compares records of two possibly different schemas.
///
/// The left key addresses fields of the first record, the right key fields of
/// the second. Orders, NULL handling and collation come from the left key.
#[derive(Debug, Clone)]
pub struct RecordComparator {
    left: RecordKey,
    right: RecordKey,
}

impl RecordComparator {
    /// Comparator over records of a single schema.
    pub fn new(key: RecordKey) -> Self {
        Self {
            right: key.clone(),
            left: key,
        }
    }

    /// Comparator between records of two schemas.
    pub fn pair(left: RecordKey, right: RecordKey) -> Result<Self> {
        if left.len() != right.len() {
            return Err(FlowError::Configuration(format!(
                "Keys have different lengths: {} fields on '{}', {} fields on '{}'",
                left.len(),
                left.schema().name(),
                right.len(),
                right.schema().name()
            )));
        }

        for (l, r) in left.parts().iter().zip(right.parts()) {
            let lt = left.schema().fields()[l.index].field_type;
            let rt = right.schema().fields()[r.index].field_type;
            if lt != rt {
                return Err(FlowError::Configuration(format!(
                    "Key field '{}' ({}) cannot be compared with '{}' ({})",
                    l.name, lt, r.name, rt
                )));
            }
        }

        Ok(Self { left, right })
    }

    pub fn left(&self) -> &RecordKey {
        &self.left
    }

    pub fn right(&self) -> &RecordKey {
        &self.right
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let collation = self.left.collation();
        for (l, r) in self.left.parts().iter().zip(self.right.parts()) {
            let ord = compare_values(
                a.value_at(l.index),
                b.value_at(r.index),
                l.order,
                self.left.equal_nulls(),
                collation,
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
}
