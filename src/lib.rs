//! # recordflow: record-oriented dataflow engine core
//!
//! Components run on their own threads and exchange typed records over
//! bounded, serialized edges. A graph runs phase by phase; within a phase all
//! components start together and finish when their inputs reach EOF.
//!
//! ## Architecture
//!
//! - **Records**: [`record::Schema`] describes a layout, [`record::Record`] is
//!   a reusable value container with a compact binary form
//! - **Keys**: [`record::RecordKey`] and [`record::RecordComparator`] order
//!   and group records, optionally across two layouts
//! - **Graph**: [`graph::GraphBuilder`] wires [`graph::Component`]s by port;
//!   the executor runs them and reports per-component status
//! - **Pool**: [`pool::StripedRecordPool`] hands batches of records between a
//!   producer and parallel workers
//! - **I/O**: [`io::SourceWindow`] and [`io::TargetWindow`] read and write
//!   record streams spread over many files with skip/limit and rotation
//! - **Communication**: crossbeam channels for records, EOF and stop signals
//!
//! ## Configuration
//!
//! Engine settings are stored under the platform config directory as
//! `recordflow/engine.toml`; see [`config`].
//!
//! ## Example
//!
//! ```ignore
//! use recordflow::graph::nodes::{CollectSink, Dedup, VecSource};
//! use recordflow::graph::GraphBuilder;
//! use recordflow::config::DedupSettings;
//!
//! let (sink, collected) = CollectSink::new("sink");
//! let mut builder = GraphBuilder::new();
//! let source = builder.add_node(VecSource::new("source", records), 0);
//! let dedup = builder.add_node(Dedup::new("dedup", DedupSettings::new("id")), 0);
//! let sink = builder.add_node(sink, 0);
//! builder.connect(source, 0, dedup, 0, schema.clone())?;
//! builder.connect(dedup, 0, sink, 0, schema)?;
//!
//! let summary = builder.build()?.run()?;
//! assert!(summary.is_ok());
//! println!("{} unique records", collected.len());
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod logging;
pub mod pool;
pub mod record;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{FlowError, Result, ResultExt};
pub use graph::{Component, Graph, GraphBuilder, NodeStatus, RunSummary};
pub use io::FaultPolicy;
pub use record::{FieldDef, FieldType, Record, RecordComparator, RecordKey, Schema, Value};
