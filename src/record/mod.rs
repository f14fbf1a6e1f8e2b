//! Records, schemas and record ordering.
//!
//! ## Architecture
//!
//! - **`Schema`**: immutable field list, shared as `Arc<Schema>`
//! - **`Record`**: reusable value container bound to one schema
//! - **`RecordKey`**: named key fields resolved to positions at init time
//! - **`RecordComparator`**: key comparison, also across two schemas
//! - **`Collation`**: pluggable string ordering for locale-aware keys

pub mod collation;
pub mod comparator;
pub mod key;
#[allow(clippy::module_inception)]
pub mod record;
pub mod schema;
pub mod value;
pub mod varint;

pub use collation::{Collation, Collator, Strength};
pub use comparator::RecordComparator;
pub use key::{RecordKey, SortOrder};
pub use record::Record;
pub use schema::{FieldDef, Schema};
pub use value::{FieldType, Value};
