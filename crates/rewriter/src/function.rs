use devbench_protocol::NodeId;
use tree_sitter::Node;

/// A `def` in the parse tree together with the node that spans its decorators.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSite<'t> {
    /// `function_definition`
    pub def: Node<'t>,
    /// `decorated_definition` when decorated, otherwise `def`
    pub outer: Node<'t>,
}

impl<'t> FunctionSite<'t> {
    pub fn from_def(def: Node<'t>) -> Option<Self> {
        if def.kind() != "function_definition" {
            return None;
        }
        let outer = def
            .parent()
            .filter(|parent| parent.kind() == "decorated_definition")
            .unwrap_or(def);
        Some(Self { def, outer })
    }

    pub fn name<'s>(&self, source: &'s str) -> Option<&'s str> {
        self.def
            .child_by_field_name("name")
            .and_then(|name| name.utf8_text(source.as_bytes()).ok())
    }

    /// 1-based line of the first decorator, or of `def` when undecorated.
    pub fn anchor_line(&self) -> usize {
        self.outer.start_position().row + 1
    }

    pub fn node_id(&self, filepath: &str, source: &str) -> Option<NodeId> {
        self.name(source)
            .map(|name| NodeId::new(filepath, self.anchor_line(), name))
    }

    pub fn body(&self) -> Option<Node<'t>> {
        self.def.child_by_field_name("body")
    }

    /// The `:` that ends the header.
    pub fn header_colon(&self) -> Option<Node<'t>> {
        let body_start = self.body()?.start_byte();
        let mut cursor = self.def.walk();
        let colon = self
            .def
            .children(&mut cursor)
            .filter(|child| child.kind() == ":" && child.end_byte() <= body_start)
            .last();
        colon
    }

    pub fn first_statement(&self) -> Option<Node<'t>> {
        statements(self.body()?).into_iter().next()
    }

    /// Body sits on the header line (`def f(): return 1`).
    pub fn has_inline_body(&self) -> bool {
        match (self.header_colon(), self.first_statement()) {
            (Some(colon), Some(stmt)) => colon.end_position().row == stmt.start_position().row,
            _ => false,
        }
    }

    /// Indentation for statements placed in the body.
    pub fn body_indent(&self, source: &str, indent_unit: &str) -> String {
        if !self.has_inline_body() {
            if let Some(indent) = self
                .first_statement()
                .and_then(|stmt| leading_indent(source, stmt.start_byte()))
            {
                return indent.to_string();
            }
        }
        let def_indent = leading_indent(source, self.def.start_byte()).unwrap_or_default();
        format!("{def_indent}{indent_unit}")
    }
}

/// Non-comment named children of a block.
pub fn statements(block: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = block.walk();
    let stmts = block
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    stmts
}

/// An expression statement that is nothing but a plain string literal. f-strings and bytes
/// literals, alone or inside a concatenation, are ordinary statements.
pub fn is_docstring_statement(stmt: Node<'_>, source: &str) -> bool {
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return false;
    }
    let Some(expr) = stmt.named_child(0) else {
        return false;
    };
    match expr.kind() {
        "string" => is_plain_string(expr, source),
        "concatenated_string" => {
            let mut cursor = expr.walk();
            let parts: Vec<_> = expr
                .named_children(&mut cursor)
                .filter(|part| part.kind() != "comment")
                .collect();
            parts
                .iter()
                .all(|part| part.kind() == "string" && is_plain_string(*part, source))
        }
        _ => false,
    }
}

/// `str` literal: the prefix before the opening quote carries no `f` or `b`.
fn is_plain_string(string: Node<'_>, source: &str) -> bool {
    source
        .get(string.start_byte()..)
        .unwrap_or_default()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .all(|c| !matches!(c, 'f' | 'F' | 'b' | 'B'))
}

pub fn line_start(source: &str, byte: usize) -> usize {
    source[..byte].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

/// Offset just past the newline that ends the line containing `byte`.
pub fn line_end_inclusive(source: &str, byte: usize) -> usize {
    source[byte..]
        .find('\n')
        .map(|idx| byte + idx + 1)
        .unwrap_or(source.len())
}

/// Back `byte` up over trailing whitespace so it points just past the last visible character.
pub fn content_end(source: &str, byte: usize) -> usize {
    source[..byte].trim_end().len()
}

/// Whitespace between the start of the line and `byte`, if nothing else precedes it.
pub fn leading_indent(source: &str, byte: usize) -> Option<&str> {
    let prefix = &source[line_start(source, byte)..byte];
    prefix
        .chars()
        .all(|c| c == ' ' || c == '\t')
        .then_some(prefix)
}

/// Remove the common leading indentation from every non-blank line.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.trim_start_matches([' ', '\t'])
            } else {
                &line[margin.min(line.len())..]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PythonParser;

    fn first_def(tree: &tree_sitter::Tree) -> Option<Node<'_>> {
        fn find(node: Node<'_>) -> Option<Node<'_>> {
            if node.kind() == "function_definition" {
                return Some(node);
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            children.into_iter().find_map(find)
        }
        find(tree.root_node())
    }

    #[test]
    fn anchor_line_uses_first_decorator() {
        let source = "import x\n\n@cache\n@trace(level=2)\ndef run(a):\n    return a\n";
        let mut parser = PythonParser::new().unwrap();
        let tree = parser.parse("m.py", source).unwrap();
        let site = FunctionSite::from_def(first_def(&tree).unwrap()).unwrap();
        assert_eq!(site.anchor_line(), 3);
        assert_eq!(site.name(source), Some("run"));
        assert_eq!(site.node_id("m.py", source).unwrap().to_string(), "m.py:3:run");
        assert_eq!(site.body_indent(source, "    "), "    ");
        assert!(!site.has_inline_body());
    }

    #[test]
    fn inline_body_uses_def_indent_plus_unit() {
        let source = "class A:\n  def f(self): return 1\n";
        let mut parser = PythonParser::new().unwrap();
        let tree = parser.parse("m.py", source).unwrap();
        let site = FunctionSite::from_def(first_def(&tree).unwrap()).unwrap();
        assert!(site.has_inline_body());
        assert_eq!(site.body_indent(source, "    "), "      ");
    }

    #[test]
    fn header_colon_ignores_annotations() {
        let source = "def f(a: int, b: dict[str, int] = {}) -> int:\n    return a\n";
        let mut parser = PythonParser::new().unwrap();
        let tree = parser.parse("m.py", source).unwrap();
        let site = FunctionSite::from_def(first_def(&tree).unwrap()).unwrap();
        let colon = site.header_colon().unwrap();
        assert_eq!(colon.start_byte(), source.find(" -> int:").unwrap() + 7);
    }

    #[test]
    fn only_plain_string_literals_count_as_docstrings() {
        let cases = [
            ("def f():\n    \"doc\"\n", true),
            ("def f():\n    r'''raw'''\n", true),
            ("def f():\n    u\"doc\"\n", true),
            ("def f():\n    \"a\" \"b\"\n", true),
            ("def f(x):\n    f\"{x}\"\n", false),
            ("def f():\n    b\"raw\"\n", false),
            ("def f():\n    Rb'raw'\n", false),
            ("def f(x):\n    \"a\" f\"{x}\"\n", false),
            ("def f():\n    return 1\n", false),
        ];
        let mut parser = PythonParser::new().unwrap();
        for (source, expected) in cases {
            let tree = parser.parse("m.py", source).unwrap();
            let site = FunctionSite::from_def(first_def(&tree).unwrap()).unwrap();
            let stmt = site.first_statement().unwrap();
            assert_eq!(is_docstring_statement(stmt, source), expected, "{source}");
        }
    }

    #[test]
    fn dedent_strips_common_margin() {
        assert_eq!(
            dedent("    def f():\n        return 1\n\n    x\n"),
            "def f():\n    return 1\n\nx\n"
        );
    }
}
