use crate::config::RewriterConfig;
use crate::docstring::docstring_literal;
use crate::edit::Edit;
use crate::function::{
    content_end, is_docstring_statement, leading_indent, line_end_inclusive, line_start, statements,
    FunctionSite,
};
use devbench_protocol::{DocstringMap, NodeId};
use std::collections::BTreeSet;
use tree_sitter::Node;

/// How a function takes part in a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Stubbed in the skeleton
    Target,
    /// Deleted from the skeleton
    Dependent,
}

/// Nodes of one file that a step develops, split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePlan {
    pub filepath: String,
    pub targets: BTreeSet<NodeId>,
    pub dependents: BTreeSet<NodeId>,
}

impl FilePlan {
    pub fn new(filepath: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            ..Default::default()
        }
    }

    pub fn role(&self, id: &NodeId) -> Option<Role> {
        if self.targets.contains(id) {
            Some(Role::Target)
        } else if self.dependents.contains(id) {
            Some(Role::Dependent)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.dependents.is_empty()
    }
}

/// Computes edit lists over an immutable parse tree.
pub(crate) struct EditPlanner<'a> {
    pub source: &'a str,
    pub plan: &'a FilePlan,
    pub docstrings: &'a DocstringMap,
    pub config: &'a RewriterConfig,
}

impl<'a> EditPlanner<'a> {
    fn role_of(&self, site: &FunctionSite<'_>) -> Option<(NodeId, Role)> {
        let id = site.node_id(&self.plan.filepath, self.source)?;
        let role = self.plan.role(&id)?;
        Some((id, role))
    }

    fn literal_for(&self, id: &NodeId, indent: &str) -> String {
        let text = self
            .docstrings
            .get(id)
            .map(|entry| entry.docstring.as_str())
            .unwrap_or(&self.config.placeholder_docstring);
        docstring_literal(text, indent, self.config.wrap_width)
    }

    // ---- skeleton ----

    pub fn skeleton_edits(&self, root: Node<'_>) -> Vec<Edit> {
        let mut edits = Vec::new();
        self.skeleton_container(root, &mut edits);
        edits
    }

    fn skeleton_container(&self, node: Node<'_>, edits: &mut Vec<Edit>) {
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();

        let mut removals: Vec<(Node<'_>, Edit)> = Vec::new();
        for child in children {
            if let Some(removal) = self.skeleton_node(child, edits) {
                removals.push((child, removal));
            }
        }

        if removals.is_empty() {
            return;
        }

        // A block may not be left without statements.
        if node.kind() == "block" && removals.len() == statements(node).len() {
            let (first, edit) = &mut removals[0];
            let indent = leading_indent(self.source, first.start_byte()).unwrap_or_default();
            log::debug!(
                "Block at line {} emptied, keeping a pass statement",
                node.start_position().row + 1
            );
            edit.replacement = format!("{indent}pass\n");
        }

        edits.extend(removals.into_iter().map(|(_, edit)| edit));
    }

    /// Returns a removal edit when `node` is a dependent definition to delete.
    fn skeleton_node(&self, node: Node<'_>, edits: &mut Vec<Edit>) -> Option<Edit> {
        let def = match node.kind() {
            "function_definition" => node,
            "decorated_definition" => match node.child_by_field_name("definition") {
                Some(def) if def.kind() == "function_definition" => def,
                _ => {
                    self.skeleton_container(node, edits);
                    return None;
                }
            },
            _ => {
                self.skeleton_container(node, edits);
                return None;
            }
        };

        let Some(site) = FunctionSite::from_def(def) else {
            self.skeleton_container(node, edits);
            return None;
        };

        match self.role_of(&site) {
            Some((id, Role::Target)) => {
                if let Some(edit) = self.stub_edit(&site, &id) {
                    log::debug!("Stubbing {id}");
                    edits.push(edit);
                } else {
                    log::warn!("Cannot stub {id}: definition has no body");
                }
                None
            }
            Some((id, Role::Dependent)) => {
                log::debug!("Removing {id}");
                Some(self.removal_edit(&site))
            }
            None => {
                self.skeleton_container(node, edits);
                None
            }
        }
    }

    fn stub_edit(&self, site: &FunctionSite<'_>, id: &NodeId) -> Option<Edit> {
        let colon = site.header_colon()?;
        let body = site.body()?;
        let indent = site.body_indent(self.source, &self.config.indent_unit);
        let literal = self.literal_for(id, &indent);
        let stub = self.config.stub_statement.trim();
        Some(Edit::replace(
            colon.end_byte(),
            content_end(self.source, body.end_byte()),
            format!("\n{indent}{literal}\n{indent}{stub}"),
        ))
    }

    fn removal_edit(&self, site: &FunctionSite<'_>) -> Edit {
        let start = line_start(self.source, site.outer.start_byte());
        let end = line_end_inclusive(
            self.source,
            content_end(self.source, site.outer.end_byte()),
        );
        Edit::delete(start, end)
    }

    // ---- reference ----

    pub fn reference_edits(&self, root: Node<'_>) -> Vec<Edit> {
        let mut edits = Vec::new();
        self.reference_node(root, &mut edits);
        edits
    }

    fn reference_node(&self, node: Node<'_>, edits: &mut Vec<Edit>) {
        if let Some(site) = FunctionSite::from_def(node) {
            if let Some((id, _)) = self.role_of(&site) {
                if let Some(edit) = self.docstring_edit(&site, &id) {
                    log::debug!("Annotating {id}");
                    edits.push(edit);
                }
            }
        }

        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        for child in children {
            self.reference_node(child, edits);
        }
    }

    /// Replace the leading docstring, or insert one before the first statement.
    fn docstring_edit(&self, site: &FunctionSite<'_>, id: &NodeId) -> Option<Edit> {
        let stmt = site.first_statement()?;
        let indent = site.body_indent(self.source, &self.config.indent_unit);
        let literal = self.literal_for(id, &indent);

        let (start, lead) = if site.has_inline_body() {
            let colon = site.header_colon()?;
            (colon.end_byte(), format!("\n{indent}"))
        } else {
            (stmt.start_byte(), String::new())
        };

        if is_docstring_statement(stmt, self.source) {
            let end = content_end(self.source, stmt.end_byte());
            Some(Edit::replace(start, end, format!("{lead}{literal}")))
        } else {
            Some(Edit::replace(
                start,
                stmt.start_byte(),
                format!("{lead}{literal}\n{indent}"),
            ))
        }
    }
}
