//! Dataflow graph runtime.
//!
//! ## Architecture
//!
//! - **Components** implement [`Component`] and declare static port arrays.
//! - **Edges** are bounded crossbeam channels of serialized records with
//!   explicit EOF frames ([`edge`]).
//! - **Executor** validates the graph, runs it phase by phase with one thread
//!   per component, and collects per-component reports ([`executor`]).
//! - **Stop signal** lets any blocked port operation return promptly when the
//!   graph is aborted ([`stop`]).
//! - **Registry** carries graph-scoped named resources ([`registry`]).
//! - **Nodes** provide the canonical traversal patterns ([`nodes`]).

pub mod edge;
pub mod error;
pub mod executor;
pub mod id;
pub mod node;
pub mod nodes;
pub mod port;
pub mod registry;
pub mod status;
pub mod stop;

pub use edge::{EdgeOptions, EdgeStats, InputPort, OutputPort};
pub use error::GraphError;
pub use executor::{EdgeDef, Graph, GraphBuilder, NodeReport, RunSummary};
pub use id::{EdgeId, NodeId, PortRef};
pub use node::{Component, InitContext, NodeContext};
pub use port::{Multiplicity, PortDescriptor, PortDirection};
pub use registry::{Registry, Sequence, SequenceDef};
pub use status::NodeStatus;
pub use stop::{stop_pair, StopHandle, StopSignal};
