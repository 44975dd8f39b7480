//! Partition of call-graph nodes into test and core functions.
//!
//! Relative to a set of roots (the traced test functions):
//!
//! ```text
//! all nodes ──┬── test nodes ──┬── target test    (= roots)
//!             │                └── dependent test (other test nodes)
//!             └── core nodes ──┬── target core    (direct non-test callees of a root)
//!                              └── dependent core (core − target core)
//! ```

use crate::types::CallGraph;
use devbench_protocol::NodeId;
use std::collections::BTreeSet;
use std::path::{Component, Path};

fn is_test_token(part: &str) -> bool {
    part.starts_with("test") || part.ends_with("test")
}

/// A path is a test path if any component (the file name included, extension and all) starts
/// or ends with `test`.
pub fn is_test_path(filepath: &str) -> bool {
    Path::new(filepath).components().any(|component| match component {
        Component::Normal(part) => part.to_str().is_some_and(is_test_token),
        _ => false,
    })
}

pub fn is_test_node(id: &NodeId) -> bool {
    is_test_path(&id.filepath)
}

pub fn test_nodes(graph: &CallGraph) -> BTreeSet<NodeId> {
    graph.nodes().filter(|id| is_test_node(id)).cloned().collect()
}

pub fn core_nodes(graph: &CallGraph) -> BTreeSet<NodeId> {
    graph.nodes().filter(|id| !is_test_node(id)).cloned().collect()
}

/// Non-test direct successors of any root; roots absent from the graph contribute nothing.
pub fn target_core_nodes(graph: &CallGraph, roots: &[NodeId]) -> BTreeSet<NodeId> {
    roots
        .iter()
        .flat_map(|root| graph.successors(root))
        .filter(|id| !is_test_node(id))
        .cloned()
        .collect()
}

pub fn dependent_core_nodes(graph: &CallGraph, roots: &[NodeId]) -> BTreeSet<NodeId> {
    let targets = target_core_nodes(graph, roots);
    core_nodes(graph)
        .into_iter()
        .filter(|id| !targets.contains(id))
        .collect()
}

pub fn target_test_nodes(roots: &[NodeId]) -> BTreeSet<NodeId> {
    roots.iter().cloned().collect()
}

pub fn dependent_test_nodes(graph: &CallGraph, roots: &[NodeId]) -> BTreeSet<NodeId> {
    test_nodes(graph)
        .into_iter()
        .filter(|id| !roots.contains(id))
        .collect()
}

/// All classifications of one graph relative to its roots, computed in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub test_nodes: BTreeSet<NodeId>,
    pub core_nodes: BTreeSet<NodeId>,
    pub target_test_nodes: BTreeSet<NodeId>,
    pub dependent_test_nodes: BTreeSet<NodeId>,
    pub target_core_nodes: BTreeSet<NodeId>,
    pub dependent_core_nodes: BTreeSet<NodeId>,
}

impl Classification {
    pub fn compute(graph: &CallGraph, roots: &[NodeId]) -> Self {
        let (test_nodes, core_nodes): (BTreeSet<NodeId>, BTreeSet<NodeId>) =
            graph.nodes().cloned().partition(is_test_node);
        let target_test_nodes = target_test_nodes(roots);
        let dependent_test_nodes = test_nodes
            .difference(&target_test_nodes)
            .cloned()
            .collect();
        let target_core_nodes = target_core_nodes(graph, roots);
        let dependent_core_nodes = core_nodes.difference(&target_core_nodes).cloned().collect();

        Self {
            test_nodes,
            core_nodes,
            target_test_nodes,
            dependent_test_nodes,
            target_core_nodes,
            dependent_core_nodes,
        }
    }
}
