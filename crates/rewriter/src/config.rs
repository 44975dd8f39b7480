use crate::error::{Result, RewriteError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PLACEHOLDER_DOCSTRING: &str = "TODO: Implement this function";

/// Configuration for skeleton/reference rewriting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriterConfig {
    /// Column at which docstring paragraphs are wrapped
    pub wrap_width: usize,

    /// Docstring used for nodes without a synthesized one
    pub placeholder_docstring: String,

    /// Statement that replaces a stubbed body
    pub stub_statement: String,

    /// One level of indentation, used when a body has no line of its own
    pub indent_unit: String,

    /// Re-parse rewritten files and reject syntax errors
    pub validate_output: bool,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            wrap_width: 100,
            placeholder_docstring: DEFAULT_PLACEHOLDER_DOCSTRING.to_string(),
            stub_statement: "...".to_string(),
            indent_unit: "    ".to_string(),
            validate_output: true,
        }
    }
}

impl RewriterConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.wrap_width == 0 {
            return Err(RewriteError::invalid_config("wrap_width must be greater than 0"));
        }

        let stub = self.stub_statement.trim();
        if stub.is_empty() || stub.contains('\n') {
            return Err(RewriteError::invalid_config(
                "stub_statement must be a single non-empty line",
            ));
        }

        if self.indent_unit.is_empty() || !self.indent_unit.chars().all(|c| c == ' ' || c == '\t')
        {
            return Err(RewriteError::invalid_config(
                "indent_unit must be spaces or tabs",
            ));
        }

        Ok(())
    }
}
