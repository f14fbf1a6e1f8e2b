//! Graph construction errors.

use crate::graph::id::NodeId;
use thiserror::Error;

/// Errors raised while assembling a graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Cycle detected in graph: only {scheduled} of {total} nodes can be ordered")]
    CycleDetected { scheduled: usize, total: usize },

    #[error("Port mismatch on node '{node}': {message}")]
    PortMismatch { node: String, message: String },

    #[error("Edge from phase {from} to earlier phase {to}")]
    PhaseOrder { from: u32, to: u32 },
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
