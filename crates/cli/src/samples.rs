//! Text-generation samples: function texts for docstrings, test texts for specifications.

use crate::prompts::PromptSet;
use crate::textgen::ChatRequest;
use anyhow::Result;
use devbench_protocol::{
    DevelopmentStep, DocstringEntry, DocstringMap, NodeId, SpecificationEntry,
};
use devbench_rewriter::{read_project_file, Rewriter};
use devbench_schedule::collect_nodes_to_develop;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocstringSample {
    pub node: NodeId,
    pub function_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecificationSample {
    pub step: usize,
    pub test_contents: Vec<String>,
}

impl SpecificationSample {
    /// Every test text followed by a blank line.
    pub fn user_content(&self) -> String {
        self.test_contents
            .iter()
            .map(|content| format!("{content}\n\n"))
            .collect()
    }
}

/// Source of `node`, or `None` (with a warning) when it cannot be located.
fn lookup_function(
    rewriter: &mut Rewriter,
    project_root: &Path,
    node: &NodeId,
) -> Result<Option<String>> {
    let source = read_project_file(project_root, &node.filepath)?;
    match rewriter.find_function(&node.filepath, &source, &node.name, node.lineno) {
        Ok(Some(content)) => Ok(Some(content)),
        Ok(None) => {
            log::warn!("Could not find function content for `{node}`, skipping");
            Ok(None)
        }
        Err(err) => {
            log::warn!("Could not parse `{}` for `{node}`, skipping: {err}", node.filepath);
            Ok(None)
        }
    }
}

/// One sample per node developed by any step.
pub fn prepare_docstring_samples(
    rewriter: &mut Rewriter,
    project_root: &Path,
    steps: &[DevelopmentStep],
) -> Result<Vec<DocstringSample>> {
    let mut samples = Vec::new();
    for node in collect_nodes_to_develop(steps) {
        if let Some(function_content) = lookup_function(rewriter, project_root, &node)? {
            samples.push(DocstringSample {
                node,
                function_content,
            });
        }
    }
    log::info!("Prepared {} docstring samples", samples.len());
    Ok(samples)
}

/// One sample per step that has at least one locatable target test.
pub fn prepare_specification_samples(
    rewriter: &mut Rewriter,
    project_root: &Path,
    steps: &[DevelopmentStep],
) -> Result<Vec<SpecificationSample>> {
    let mut samples = Vec::new();
    for step in steps {
        let mut test_contents = Vec::new();
        for node in &step.target_test_nodes {
            if let Some(content) = lookup_function(rewriter, project_root, node)? {
                test_contents.push(content);
            }
        }
        if test_contents.is_empty() {
            log::debug!("Step {}: no target test text, skipping", step.step);
            continue;
        }
        samples.push(SpecificationSample {
            step: step.step,
            test_contents,
        });
    }
    log::info!("Prepared {} specification samples", samples.len());
    Ok(samples)
}

pub fn docstring_requests(
    samples: &[DocstringSample],
    prompts: &PromptSet,
    model: &str,
    n_shots: usize,
) -> Vec<ChatRequest> {
    samples
        .iter()
        .map(|sample| prompts.request(model, n_shots, sample.function_content.as_str()))
        .collect()
}

pub fn specification_requests(
    samples: &[SpecificationSample],
    prompts: &PromptSet,
    model: &str,
    n_shots: usize,
) -> Vec<ChatRequest> {
    samples
        .iter()
        .map(|sample| prompts.request(model, n_shots, sample.user_content()))
        .collect()
}

/// Pair samples with their responses, dropping the unanswered ones.
pub fn collect_docstrings(
    samples: Vec<DocstringSample>,
    responses: Vec<Option<String>>,
) -> DocstringMap {
    samples
        .into_iter()
        .zip(responses)
        .filter_map(|(sample, response)| {
            let docstring = response?;
            Some((
                sample.node,
                DocstringEntry {
                    docstring,
                    function_content: sample.function_content,
                },
            ))
        })
        .collect()
}

pub fn collect_specifications(
    samples: &[SpecificationSample],
    responses: Vec<Option<String>>,
) -> Vec<SpecificationEntry> {
    samples
        .iter()
        .zip(responses)
        .filter_map(|(sample, response)| {
            response.map(|specification| SpecificationEntry {
                step: sample.step,
                specification,
            })
        })
        .collect()
}
