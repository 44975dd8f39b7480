use crate::error::{Result, RewriteError};
use crate::language::Language;
use crate::rewriter::Rewriter;
use crate::transform::FilePlan;
use devbench_protocol::{DevelopmentStep, DocstringMap, FileContent};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Files a step materializes, in filepath order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepFiles {
    pub skeleton: Vec<FileContent>,
    pub reference: Vec<FileContent>,
}

/// Group the step's nodes-to-develop by file, split into targets and dependents.
pub fn plan_files(step: &DevelopmentStep) -> Vec<FilePlan> {
    let develop: BTreeSet<_> = step.nodes_to_develop.iter().collect();
    let mut plans: BTreeMap<String, FilePlan> = BTreeMap::new();

    for id in step.target_core_nodes.iter().filter(|id| develop.contains(id)) {
        plans
            .entry(id.filepath.clone())
            .or_insert_with(|| FilePlan::new(id.filepath.clone()))
            .targets
            .insert(id.clone());
    }
    for id in step
        .dependent_core_nodes
        .iter()
        .filter(|id| develop.contains(id))
    {
        plans
            .entry(id.filepath.clone())
            .or_insert_with(|| FilePlan::new(id.filepath.clone()))
            .dependents
            .insert(id.clone());
    }

    plans.into_values().collect()
}

pub fn read_project_file(project_root: &Path, filepath: &str) -> Result<String> {
    let path = project_root.join(filepath);
    fs::read_to_string(&path).map_err(|source| RewriteError::Io {
        path: path.display().to_string(),
        source,
    })
}

impl Rewriter {
    /// Rewrite every file touched by `step`, always reading the pristine project source.
    pub fn rewrite_step(
        &mut self,
        project_root: &Path,
        step: &DevelopmentStep,
        docstrings: &DocstringMap,
    ) -> Result<StepFiles> {
        let mut files = StepFiles::default();
        for plan in plan_files(step) {
            let language = Language::from_path(&plan.filepath);
            if language != Language::Python {
                return Err(RewriteError::UnsupportedLanguage(format!(
                    "{} ({})",
                    plan.filepath,
                    language.as_str()
                )));
            }
            let source = read_project_file(project_root, &plan.filepath)?;
            let rewritten = self.rewrite_file(&source, &plan, docstrings)?;
            files
                .skeleton
                .push(FileContent::new(rewritten.filepath.clone(), rewritten.skeleton));
            files
                .reference
                .push(FileContent::new(rewritten.filepath, rewritten.reference));
        }
        log::info!(
            "Step {}: rewrote {} files",
            step.step,
            files.skeleton.len()
        );
        Ok(files)
    }
}
