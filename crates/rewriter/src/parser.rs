use crate::error::{Result, RewriteError};
use crate::language::Language;
use tree_sitter::{Parser, Tree};

/// Tree-sitter parser bound to the Python grammar.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let ts_language = Language::Python.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| RewriteError::tree_sitter(format!("Failed to set language: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse `source`, rejecting input with syntax errors.
    pub fn parse(&mut self, path: &str, source: &str) -> Result<Tree> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| RewriteError::parse(path, "parser returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(&tree).unwrap_or(0);
            return Err(RewriteError::parse(
                path,
                format!("syntax error near line {line}"),
            ));
        }
        Ok(tree)
    }

    /// True when `source` parses without syntax errors.
    pub fn is_valid(&mut self, source: &str) -> bool {
        self.parser
            .parse(source, None)
            .is_some_and(|tree| !tree.root_node().has_error())
    }
}

fn first_error_line(tree: &Tree) -> Option<usize> {
    let mut cursor = tree.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        // Descend only into subtrees that contain the error.
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}
