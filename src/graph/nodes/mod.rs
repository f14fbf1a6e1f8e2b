//! Built-in components.
//!
//! ## Traversal patterns
//!
//! - [`SimpleCopy`] - one input broadcast to every output
//! - [`Concatenate`] - inputs drained strictly one after another
//! - [`SimpleGather`] - round-robin over whichever inputs have data
//! - [`Merge`] - k-way merge of key-sorted inputs
//! - [`Dedup`] - first/last/unique per key group
//! - [`SequenceChecker`] - key order verification
//!
//! ## Endpoints and transforms
//!
//! - [`Reader`] / [`Writer`] - file windows plus a codec
//! - [`ParallelSort`] - striped pool fan-out to sorting workers
//! - [`Filter`] / [`Reformat`] - closures injected at build time
//! - [`VecSource`] / [`CollectSink`] - in-memory endpoints

pub mod broadcast;
pub mod concatenate;
pub mod dedup;
pub mod filter;
pub mod gather;
pub mod memory;
pub mod merge;
pub mod reader;
pub mod reformat;
pub mod sequence_check;
pub mod sort;
pub mod writer;

pub use broadcast::SimpleCopy;
pub use concatenate::Concatenate;
pub use dedup::Dedup;
pub use filter::Filter;
pub use gather::SimpleGather;
pub use memory::{CollectSink, Collected, VecSource};
pub use merge::Merge;
pub use reader::Reader;
pub use reformat::Reformat;
pub use sequence_check::SequenceChecker;
pub use sort::ParallelSort;
pub use writer::Writer;

use crate::error::FlowError;

/// Configuration error for a port that validation should have guaranteed.
pub(crate) fn missing_port(component: &str, what: &str) -> FlowError {
    FlowError::Configuration(format!("'{}': {} is not connected", component, what))
}
