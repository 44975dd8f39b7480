use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid node id '{0}': expected <filepath>:<lineno>:<name>")]
    InvalidNodeId(String),

    #[error("Invalid line number in node id '{id}': {reason}")]
    InvalidLineNumber { id: String, reason: String },
}

/// Identity of a function in the traced project.
///
/// `lineno` is the line of the first decorator when the function is decorated, otherwise the
/// line of the `def` keyword. Ordering follows `(filepath, lineno, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NodeId {
    pub filepath: String,
    pub lineno: usize,
    pub name: String,
}

impl NodeId {
    pub fn new(filepath: impl Into<String>, lineno: usize, name: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            lineno,
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filepath, self.lineno, self.name)
    }
}

impl FromStr for NodeId {
    type Err = ProtocolError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // Split from the right: Windows drive letters and odd paths may carry ':'.
        let mut parts = raw.rsplitn(3, ':');
        let name = parts.next().unwrap_or_default();
        let lineno = parts.next();
        let filepath = parts.next();
        let (Some(lineno), Some(filepath)) = (lineno, filepath) else {
            return Err(ProtocolError::InvalidNodeId(raw.to_string()));
        };
        if name.is_empty() || filepath.is_empty() {
            return Err(ProtocolError::InvalidNodeId(raw.to_string()));
        }
        let lineno = lineno
            .parse::<usize>()
            .map_err(|err| ProtocolError::InvalidLineNumber {
                id: raw.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self::new(filepath, lineno, name))
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for NodeId {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

/// Function reference as emitted by the tracer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub filepath: String,
    pub lineno: usize,
    pub func_name: String,
}

impl FunctionRef {
    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.filepath.clone(), self.lineno, self.func_name.clone())
    }
}

impl From<&NodeId> for FunctionRef {
    fn from(id: &NodeId) -> Self {
        Self {
            filepath: id.filepath.clone(),
            lineno: id.lineno,
            func_name: id.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn display_and_parse_agree() {
        let id = NodeId::new("pkg/mod.py", 12, "run");
        assert_eq!(id.to_string(), "pkg/mod.py:12:run");
        assert_eq!("pkg/mod.py:12:run".parse::<NodeId>().unwrap(), id);
    }

    #[test]
    fn parse_splits_from_the_right() {
        let id: NodeId = "C:/work/pkg/mod.py:3:helper".parse().unwrap();
        assert_eq!(id.filepath, "C:/work/pkg/mod.py");
        assert_eq!(id.lineno, 3);
        assert_eq!(id.name, "helper");
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!(matches!(
            "mod.py:run".parse::<NodeId>(),
            Err(ProtocolError::InvalidNodeId(_))
        ));
        assert!(matches!(
            "mod.py:x:run".parse::<NodeId>(),
            Err(ProtocolError::InvalidLineNumber { .. })
        ));
        assert!(":1:run".parse::<NodeId>().is_err());
    }

    #[test]
    fn same_name_different_line_are_distinct() {
        let a = NodeId::new("a.py", 1, "f");
        let b = NodeId::new("a.py", 9, "f");
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn node_id_works_as_json_map_key() {
        let mut map = BTreeMap::new();
        map.insert(NodeId::new("a.py", 1, "f"), 1u32);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"a.py:1:f":1}"#);
        let back: BTreeMap<NodeId, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn function_ref_maps_to_node_id() {
        let func = FunctionRef {
            filepath: "lib/core.py".into(),
            lineno: 40,
            func_name: "parse".into(),
        };
        assert_eq!(func.node_id().to_string(), "lib/core.py:40:parse");
        assert_eq!(FunctionRef::from(&func.node_id()), func);
    }
}
