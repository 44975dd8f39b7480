//! # Devbench Rewriter
//!
//! Syntax-tree driven rewriting of Python sources into skeleton and reference files.
//!
//! ## Architecture
//!
//! ```text
//! Source file + FilePlan (targets, dependents) + docstrings
//!     │
//!     ├──> Tree-sitter Parsing → immutable tree
//!     │
//!     ├──> Skeleton edits
//!     │    ├─> target:    body → docstring + stub statement
//!     │    └─> dependent: whole definition removed (`pass` if a block empties)
//!     │
//!     ├──> Reference edits
//!     │    └─> target/dependent: leading docstring inserted or replaced
//!     │
//!     └──> Apply sorted byte edits, re-parse, emit both files
//! ```
//!
//! Everything outside an edited range is copied byte for byte.

mod config;
mod docstring;
mod edit;
mod error;
mod function;
mod language;
mod parser;
mod rewriter;
mod step;
mod transform;

pub use config::{RewriterConfig, DEFAULT_PLACEHOLDER_DOCSTRING};
pub use docstring::{docstring_literal, format_docstring, wrap_line};
pub use edit::{apply_edits, Edit};
pub use error::{Result, RewriteError};
pub use language::Language;
pub use parser::PythonParser;
pub use rewriter::{RewrittenFile, Rewriter};
pub use step::{plan_files, read_project_file, StepFiles};
pub use transform::{FilePlan, Role};
