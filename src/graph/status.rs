//! Component result states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state and final result of a component or a whole graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// Not executed (an earlier phase failed or the graph stopped first)
    NotAvailable,
    Ready,
    Running,
    Ok,
    Error,
    FatalError,
    Aborted,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Ok | NodeStatus::Error | NodeStatus::FatalError | NodeStatus::Aborted
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(self, NodeStatus::Error | NodeStatus::FatalError)
    }

    fn severity(self) -> u8 {
        match self {
            NodeStatus::Ok => 0,
            NodeStatus::NotAvailable | NodeStatus::Ready | NodeStatus::Running => 1,
            NodeStatus::Aborted => 2,
            NodeStatus::Error => 3,
            NodeStatus::FatalError => 4,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: NodeStatus) -> NodeStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::NotAvailable => "N/A",
            NodeStatus::Ready => "READY",
            NodeStatus::Running => "RUNNING",
            NodeStatus::Ok => "FINISHED_OK",
            NodeStatus::Error => "ERROR",
            NodeStatus::FatalError => "FATAL_ERROR",
            NodeStatus::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst() {
        assert_eq!(NodeStatus::Ok.worst(NodeStatus::Aborted), NodeStatus::Aborted);
        assert_eq!(
            NodeStatus::FatalError.worst(NodeStatus::Error),
            NodeStatus::FatalError
        );
        assert_eq!(NodeStatus::Error.worst(NodeStatus::Ok), NodeStatus::Error);
    }

    #[test]
    fn test_terminal() {
        assert!(NodeStatus::Aborted.is_terminal());
        assert!(!NodeStatus::Running.is_terminal());
        assert!(NodeStatus::FatalError.is_failure());
    }
}
