use crate::types::CallGraph;
use devbench_protocol::{CallRelation, TraceRecord};

impl CallGraph {
    /// Build a call graph from caller/callee pairs; one edge per distinct pair.
    pub fn from_relations<'a>(relations: impl IntoIterator<Item = &'a CallRelation>) -> Self {
        let mut graph = CallGraph::new();
        for relation in relations {
            graph.add_edge(relation.caller.node_id(), relation.callee.node_id());
        }
        graph
    }

    /// Build the call graph of a single traced test.
    ///
    /// The root (test function) is not added on its own: a trace whose root never appears in a
    /// call relation yields a graph without it.
    pub fn from_trace(trace: &TraceRecord) -> Self {
        let graph = Self::from_relations(&trace.call_relations);
        log::debug!(
            "Built call graph for {}: {} nodes, {} edges",
            trace.test_id,
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devbench_protocol::{FunctionRef, NodeId};

    fn func(file: &str, line: usize, name: &str) -> FunctionRef {
        FunctionRef {
            filepath: file.into(),
            lineno: line,
            func_name: name.into(),
        }
    }

    fn relation(caller: FunctionRef, callee: FunctionRef) -> CallRelation {
        CallRelation { caller, callee }
    }

    #[test]
    fn builds_edges_from_trace() {
        let root = func("tests/test_a.py", 3, "test_a");
        let f = func("pkg/a.py", 1, "f");
        let g = func("pkg/a.py", 8, "g");
        let trace = TraceRecord {
            test_id: "tests/test_a.py::test_a".into(),
            test_func_id: root.node_id(),
            call_relations: vec![
                relation(root.clone(), f.clone()),
                relation(f.clone(), g.clone()),
                relation(root.clone(), f.clone()),
            ],
        };

        let graph = CallGraph::from_trace(&trace);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.successors(&root.node_id()), vec![&f.node_id()]);
        assert_eq!(graph.successors(&f.node_id()), vec![&g.node_id()]);
    }

    #[test]
    fn empty_trace_has_no_root() {
        let trace = TraceRecord {
            test_id: "t".into(),
            test_func_id: NodeId::new("tests/test_a.py", 1, "test_a"),
            call_relations: vec![],
        };
        let graph = CallGraph::from_trace(&trace);
        assert!(graph.is_empty());
        assert!(!graph.contains(&trace.test_func_id));
    }
}
