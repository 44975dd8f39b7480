use devbench_protocol::NodeId;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Directed call-relation graph over function identities.
///
/// Simple graph: at most one edge per ordered pair. Cycles and self-loops are allowed.
#[derive(Debug, Clone)]
pub struct CallGraph {
    /// caller -> callee
    pub graph: DiGraph<NodeId, ()>,

    /// Node id -> NodeIndex mapping for fast lookup
    pub node_index: HashMap<NodeId, NodeIndex>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    /// Add node to graph, returning the existing index if already present
    pub fn add_node(&mut self, id: NodeId) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_index.insert(id, idx);
        idx
    }

    /// Add edge between nodes; duplicate edges collapse
    pub fn add_edge(&mut self, caller: NodeId, callee: NodeId) {
        let from = self.add_node(caller);
        let to = self.add_node(callee);
        self.graph.update_edge(from, to, ());
    }

    pub fn find_node(&self, id: &NodeId) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}
