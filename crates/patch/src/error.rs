use thiserror::Error;

pub type Result<T> = std::result::Result<T, PatchError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatchError {
    #[error("Malformed patch at line {line}: {reason}")]
    MalformedPatch { line: usize, reason: String },

    #[error("Malformed replace block at line {line}: {reason}")]
    MalformedReplace { line: usize, reason: String },

    #[error("Patch does not apply to {path}: mismatch at line {line}")]
    ContextMismatch { path: String, line: usize },

    #[error("File not found: {0}")]
    MissingFile(String),

    #[error("File already exists: {0}")]
    FileExists(String),

    #[error("Search block {block} not found in {path}")]
    SearchNotFound { path: String, block: usize },
}

impl PatchError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPatch {
            line,
            reason: reason.into(),
        }
    }
}
