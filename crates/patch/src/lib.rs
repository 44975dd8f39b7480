//! Patch derivation between skeleton and reference file sets.
//!
//! ```text
//! skeleton files ─┐
//!                 ├─ generate_patch ─► unified diff ─► patch_to_replace ─► replace blocks
//! reference files ┘                         │                                   │
//!                                      apply_patch                         apply_replace
//! ```

pub mod apply;
pub mod error;
pub mod parse;
pub mod replace;
pub mod unified;

pub use apply::apply_patch;
pub use error::{PatchError, Result};
pub use parse::{parse_patch, FilePatch, Hunk, HunkLine};
pub use replace::{apply_replace, parse_replace, patch_to_replace, ReplaceBlock, ReplaceFile};
pub use unified::{file_diff, generate_patch, CONTEXT_RADIUS, DEV_NULL};
