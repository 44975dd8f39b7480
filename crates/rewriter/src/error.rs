use thiserror::Error;

/// Result type for rewriting operations
pub type Result<T> = std::result::Result<T, RewriteError>;

/// Errors that can occur while rewriting source files
#[derive(Error, Debug)]
pub enum RewriteError {
    /// The input source does not parse cleanly
    #[error("Parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    /// A transform produced source that no longer parses
    #[error("Rewritten {mode} output for {path} is not valid Python")]
    InvalidOutput { path: String, mode: &'static str },

    /// Unsupported language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two edits touch the same byte range
    #[error("Overlapping edits at byte {start} (previous edit ends at {previous_end})")]
    OverlappingEdits { start: usize, previous_end: usize },

    /// IO error occurred
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl RewriteError {
    /// Create a parse error
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
