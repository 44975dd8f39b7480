//! Interchange records shared by the devbench pipeline stages.
//!
//! Pipeline files (traces, schedules, docstrings, step outcomes) use kebab-case field names;
//! task instances use snake_case to match the evaluation harness.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod node;

pub use node::{FunctionRef, NodeId, ProtocolError};

/// Separator substituted for `/` in repository names when forming instance ids.
pub const REPO_SEPARATOR: &str = "__--__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRelation {
    pub caller: FunctionRef,
    pub callee: FunctionRef,
}

/// One traced test execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TraceRecord {
    pub test_id: String,
    pub test_func_id: NodeId,
    #[serde(default)]
    pub call_relations: Vec<CallRelation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DevelopmentStep {
    pub step: usize,
    pub test_ids: Vec<String>,
    pub root_nodes: Vec<NodeId>,
    pub test_nodes: Vec<NodeId>,
    pub core_nodes: Vec<NodeId>,
    pub target_test_nodes: Vec<NodeId>,
    pub dependent_test_nodes: Vec<NodeId>,
    pub target_core_nodes: Vec<NodeId>,
    pub dependent_core_nodes: Vec<NodeId>,
    pub nodes_to_develop: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLinkNode {
    pub id: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLinkEdge {
    pub source: NodeId,
    pub target: NodeId,
}

/// Edge-list rendering of a call graph (node-link layout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLinkGraph {
    pub directed: bool,
    pub multigraph: bool,
    #[serde(default)]
    pub graph: serde_json::Map<String, serde_json::Value>,
    pub nodes: Vec<NodeLinkNode>,
    pub edges: Vec<NodeLinkEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DependencyGraphRecord {
    pub step: usize,
    pub dependency_graph: NodeLinkGraph,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocstringEntry {
    pub docstring: String,
    pub function_content: String,
}

/// Synthesized docstrings keyed by node id.
pub type DocstringMap = BTreeMap<NodeId, DocstringEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationEntry {
    pub step: usize,
    pub specification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub filepath: String,
    pub content: String,
}

impl FileContent {
    pub fn new(filepath: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            content: content.into(),
        }
    }
}

/// Materialized result of one development step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepOutcome {
    pub step: usize,
    pub skeleton_files: Vec<FileContent>,
    pub reference_files: Vec<FileContent>,
    pub reference_patch: String,
    pub fail_to_pass: Vec<String>,
    pub pass_to_pass: Vec<String>,
    pub base_commit: String,
    pub reference_commit: String,
    /// False when the reference patch is too small to be a meaningful task.
    pub flag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInstance {
    pub instance_id: String,
    pub repo: String,
    pub problem_statement: String,
    pub base_commit: String,
    pub reference_commit: String,
    pub patch: String,
    pub fail_to_pass: Vec<String>,
    pub pass_to_pass: Vec<String>,
}

/// `owner/name` + ordinal → `owner__--__name-dev-<ordinal>`.
pub fn instance_id(repo: &str, ordinal: usize) -> String {
    format!("{}-dev-{ordinal}", repo.replace('/', REPO_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trace_record_reads_kebab_case() {
        let raw = r#"{
            "test-id": "tests/test_a.py::test_one",
            "test-func-id": "tests/test_a.py:3:test_one",
            "call-relations": [
                {
                    "caller": {"filepath": "tests/test_a.py", "lineno": 3, "func_name": "test_one"},
                    "callee": {"filepath": "pkg/a.py", "lineno": 1, "func_name": "f"}
                }
            ]
        }"#;
        let record: TraceRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.test_func_id, NodeId::new("tests/test_a.py", 3, "test_one"));
        assert_eq!(record.call_relations.len(), 1);
        assert_eq!(record.call_relations[0].callee.node_id().to_string(), "pkg/a.py:1:f");
    }

    #[test]
    fn malformed_trace_fails_whole_load() {
        let raw = r#"[
            {"test-id": "t", "test-func-id": "tests/test_a.py:3:test_one", "call-relations": []},
            {"test-id": "u", "test-func-id": "not-a-node-id", "call-relations": []}
        ]"#;
        assert!(serde_json::from_str::<Vec<TraceRecord>>(raw).is_err());
    }

    #[test]
    fn step_outcome_writes_kebab_case() {
        let outcome = StepOutcome {
            step: 0,
            skeleton_files: vec![FileContent::new("a.py", "")],
            reference_files: vec![],
            reference_patch: "\n".into(),
            fail_to_pass: vec!["t".into()],
            pass_to_pass: vec![],
            base_commit: "abc".into(),
            reference_commit: "def".into(),
            flag: false,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert!(value.get("skeleton-files").is_some());
        assert!(value.get("fail-to-pass").is_some());
        assert_eq!(value["reference-commit"], "def");
    }

    #[test]
    fn instance_id_replaces_owner_separator() {
        assert_eq!(instance_id("psf/requests", 1), "psf__--__requests-dev-1");
    }
}
