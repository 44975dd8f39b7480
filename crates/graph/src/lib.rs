//! # Devbench Graph
//!
//! Call-relation graphs built from test traces.
//!
//! ## Architecture
//!
//! ```text
//! TraceRecord (caller → callee pairs)
//!     │
//!     ├──> Builder
//!     │      └─ One edge per distinct pair (petgraph DiGraph)
//!     │
//!     ├──> Merge
//!     │      └─ Union of nodes and edges across traces
//!     │
//!     └──> Classifier
//!            ├─ Test vs core nodes (path convention)
//!            └─ Target vs dependent, relative to root tests
//! ```

mod builder;
mod classify;
mod error;
mod graph;
mod types;

pub use classify::{
    core_nodes, dependent_core_nodes, dependent_test_nodes, is_test_node, is_test_path,
    target_core_nodes, target_test_nodes, test_nodes, Classification,
};
pub use error::{GraphError, Result};
pub use types::CallGraph;
