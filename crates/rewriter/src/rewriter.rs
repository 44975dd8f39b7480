use crate::config::RewriterConfig;
use crate::edit::apply_edits;
use crate::error::{Result, RewriteError};
use crate::function::{content_end, dedent, line_start, FunctionSite};
use crate::parser::PythonParser;
use crate::transform::{EditPlanner, FilePlan};
use devbench_protocol::DocstringMap;
use tree_sitter::Node;

/// Skeleton and reference renditions of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenFile {
    pub filepath: String,
    pub skeleton: String,
    pub reference: String,
}

/// Rewrites Python files for a development step.
///
/// Both renditions are computed from the same parse of the original source; neither sees the
/// other's edits.
pub struct Rewriter {
    config: RewriterConfig,
    parser: PythonParser,
}

impl Rewriter {
    pub fn new(config: RewriterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            parser: PythonParser::new()?,
        })
    }

    pub fn rewrite_file(
        &mut self,
        source: &str,
        plan: &FilePlan,
        docstrings: &DocstringMap,
    ) -> Result<RewrittenFile> {
        let tree = self.parser.parse(&plan.filepath, source)?;
        let planner = EditPlanner {
            source,
            plan,
            docstrings,
            config: &self.config,
        };

        let skeleton = apply_edits(source, planner.skeleton_edits(tree.root_node()))?;
        let reference = apply_edits(source, planner.reference_edits(tree.root_node()))?;

        if self.config.validate_output {
            self.check_output(&plan.filepath, "skeleton", &skeleton)?;
            self.check_output(&plan.filepath, "reference", &reference)?;
        }

        Ok(RewrittenFile {
            filepath: plan.filepath.clone(),
            skeleton,
            reference,
        })
    }

    /// Source text of the function named `name` anchored at `lineno`, decorators included and
    /// dedented. `None` when no definition matches.
    pub fn find_function(
        &mut self,
        path: &str,
        source: &str,
        name: &str,
        lineno: usize,
    ) -> Result<Option<String>> {
        let tree = self.parser.parse(path, source)?;
        let found = find_site(tree.root_node(), source, name, lineno).map(|site| {
            let start = line_start(source, site.outer.start_byte());
            dedent(&source[start..content_end(source, site.outer.end_byte())])
        });
        Ok(found)
    }

    fn check_output(&mut self, path: &str, mode: &'static str, output: &str) -> Result<()> {
        if self.parser.is_valid(output) {
            Ok(())
        } else {
            Err(RewriteError::InvalidOutput {
                path: path.to_string(),
                mode,
            })
        }
    }
}

fn find_site<'t>(
    node: Node<'t>,
    source: &str,
    name: &str,
    lineno: usize,
) -> Option<FunctionSite<'t>> {
    if let Some(site) = FunctionSite::from_def(node) {
        if site.anchor_line() == lineno && site.name(source) == Some(name) {
            return Some(site);
        }
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| find_site(child, source, name, lineno))
}
