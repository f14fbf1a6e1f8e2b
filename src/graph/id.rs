//! Identity types for the graph.
//!
//! IDs are newtypes over `u32` that serve as direct indices into the graph's
//! node and edge vectors.

use std::fmt;

/// Index into the graph's node list.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Index into the graph's edge list.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

/// One port slot of one node.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: usize,
}

impl PortRef {
    pub fn new(node: NodeId, port: usize) -> Self {
        Self { node, port }
    }
}

impl fmt::Debug for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortRef(node={}, port={})", self.node.0, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{:?}", id), "NodeId(42)");
        assert_eq!(id.to_string(), "NodeId(42)");
        assert!(NodeId(1) < NodeId(2));
    }

    #[test]
    fn test_edge_id() {
        let id = EdgeId(5);
        assert_eq!(id.index(), 5);
        assert_eq!(format!("{:?}", id), "EdgeId(5)");
    }

    #[test]
    fn test_port_ref_debug() {
        let p = PortRef::new(NodeId(3), 1);
        assert_eq!(format!("{:?}", p), "PortRef(node=3, port=1)");
    }
}
