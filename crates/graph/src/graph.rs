use crate::error::{GraphError, Result};
use crate::types::CallGraph;
use devbench_protocol::{NodeId, NodeLinkEdge, NodeLinkGraph, NodeLinkNode};
use petgraph::visit::EdgeRef;
use std::collections::BTreeSet;

impl CallGraph {
    /// All node ids, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.graph.node_weights()
    }

    /// All edges as (caller, callee) pairs
    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.graph
            .edge_references()
            .map(move |e| (&self.graph[e.source()], &self.graph[e.target()]))
    }

    /// Direct callees of `id`; empty when `id` is not in the graph
    pub fn successors(&self, id: &NodeId) -> Vec<&NodeId> {
        match self.find_node(id) {
            Some(idx) => self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Outgoing)
                .map(|n| &self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn node_set(&self) -> BTreeSet<NodeId> {
        self.nodes().cloned().collect()
    }

    pub fn edge_set(&self) -> BTreeSet<(NodeId, NodeId)> {
        self.edges()
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect()
    }

    /// Add every node and edge of `other` into `self`
    pub fn absorb(&mut self, other: &CallGraph) {
        for id in other.nodes() {
            self.add_node(id.clone());
        }
        for (from, to) in other.edges() {
            self.add_edge(from.clone(), to.clone());
        }
    }

    /// Union of nodes and edges. Order of `graphs` does not affect the result.
    pub fn merge(graphs: &[&CallGraph]) -> Result<CallGraph> {
        let (first, rest) = graphs.split_first().ok_or(GraphError::EmptyMerge)?;
        let mut merged = (*first).clone();
        for graph in rest {
            merged.absorb(graph);
        }
        log::debug!(
            "Merged {} graphs into {} nodes / {} edges",
            graphs.len(),
            merged.node_count(),
            merged.edge_count()
        );
        Ok(merged)
    }

    /// Node-link rendering with nodes and edges sorted by id
    pub fn to_node_link(&self) -> NodeLinkGraph {
        NodeLinkGraph {
            directed: true,
            multigraph: false,
            graph: serde_json::Map::new(),
            nodes: self
                .node_set()
                .into_iter()
                .map(|id| NodeLinkNode { id })
                .collect(),
            edges: self
                .edge_set()
                .into_iter()
                .map(|(source, target)| NodeLinkEdge { source, target })
                .collect(),
        }
    }

    pub fn from_node_link(data: &NodeLinkGraph) -> Self {
        let mut graph = CallGraph::new();
        for node in &data.nodes {
            graph.add_node(node.id.clone());
        }
        for edge in &data.edges {
            graph.add_edge(edge.source.clone(), edge.target.clone());
        }
        graph
    }
}

impl PartialEq for CallGraph {
    fn eq(&self, other: &Self) -> bool {
        self.node_set() == other.node_set() && self.edge_set() == other.edge_set()
    }
}

impl Eq for CallGraph {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(name: &str) -> NodeId {
        NodeId::new("pkg/mod.py", 1, name)
    }

    fn graph_of(edges: &[(&str, &str)]) -> CallGraph {
        let mut graph = CallGraph::new();
        for (from, to) in edges {
            graph.add_edge(id(from), id(to));
        }
        graph
    }

    #[test]
    fn duplicate_edges_collapse() {
        let graph = graph_of(&[("a", "b"), ("a", "b"), ("b", "a"), ("c", "c")]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn successors_of_missing_node_are_empty() {
        let graph = graph_of(&[("a", "b")]);
        assert!(graph.successors(&id("zzz")).is_empty());
        assert_eq!(graph.successors(&id("a")), vec![&id("b")]);
    }

    #[test]
    fn merge_rejects_empty_input() {
        assert_eq!(CallGraph::merge(&[]).unwrap_err(), GraphError::EmptyMerge);
    }

    #[test]
    fn merge_single_graph_is_identity() {
        let graph = graph_of(&[("a", "b"), ("b", "c")]);
        assert_eq!(CallGraph::merge(&[&graph]).unwrap(), graph);
    }

    #[test]
    fn node_link_is_sorted_and_reversible() {
        let graph = graph_of(&[("b", "a"), ("a", "c")]);
        let data = graph.to_node_link();
        let names: Vec<_> = data.nodes.iter().map(|n| n.id.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(data.edges[0].source, id("a"));
        assert_eq!(CallGraph::from_node_link(&data), graph);
    }

    fn arb_edges() -> impl Strategy<Value = Vec<(u8, u8)>> {
        prop::collection::vec((0u8..6, 0u8..6), 0..12)
    }

    fn graph_from_pairs(pairs: &[(u8, u8)]) -> CallGraph {
        let mut graph = CallGraph::new();
        for (from, to) in pairs {
            graph.add_edge(id(&format!("f{from}")), id(&format!("f{to}")));
        }
        graph
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in arb_edges(), b in arb_edges()) {
            let ga = graph_from_pairs(&a);
            let gb = graph_from_pairs(&b);
            let ab = CallGraph::merge(&[&ga, &gb]).unwrap();
            let ba = CallGraph::merge(&[&gb, &ga]).unwrap();
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn merge_is_associative(a in arb_edges(), b in arb_edges(), c in arb_edges()) {
            let ga = graph_from_pairs(&a);
            let gb = graph_from_pairs(&b);
            let gc = graph_from_pairs(&c);
            let left = CallGraph::merge(&[&CallGraph::merge(&[&ga, &gb]).unwrap(), &gc]).unwrap();
            let right = CallGraph::merge(&[&ga, &CallGraph::merge(&[&gb, &gc]).unwrap()]).unwrap();
            prop_assert_eq!(left, right);
        }
    }
}
