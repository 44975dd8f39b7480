//! Per-step materialization: rewrite, diff, commit, and flag.
//!
//! Steps run strictly in order against one working tree. For step `n`:
//!
//! ```text
//! main ──┬── step-n-skeleton   (skeleton files)   → base commit
//!        └── step-n-reference  (reference files)  → reference commit
//! ```
//!
//! Both branches fork from the base branch and the tree returns to it afterwards; nothing is
//! ever merged back.

use crate::dataset::pytest_command;
use crate::tokens::{is_nontrivial, TokenCounter};
use crate::vcs::VersionControl;
use anyhow::{Context as AnyhowContext, Result};
use devbench_patch::generate_patch;
use devbench_protocol::{DevelopmentStep, DocstringMap, StepOutcome};
use devbench_rewriter::{Rewriter, StepFiles};
use std::path::Path;

pub fn skeleton_branch(step: usize) -> String {
    format!("step-{step}-skeleton")
}

pub fn reference_branch(step: usize) -> String {
    format!("step-{step}-reference")
}

/// Commit hashes recorded for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommits {
    pub base_commit: String,
    pub reference_commit: String,
}

/// Fork both step branches from the current branch and return to it.
pub fn commit_step<V: VersionControl + ?Sized>(
    vcs: &mut V,
    step: usize,
    files: &StepFiles,
) -> Result<StepCommits> {
    let base = vcs.current_branch()?;

    vcs.create_and_checkout(&skeleton_branch(step))?;
    vcs.write_files(&files.skeleton)?;
    vcs.commit(&format!("prepare skeleton for step {step}"))?;
    let base_commit = vcs.current_commit_hash()?;
    vcs.checkout(&base)?;

    vcs.create_and_checkout(&reference_branch(step))?;
    vcs.write_files(&files.reference)?;
    vcs.commit(&format!("prepare reference for step {step}"))?;
    let reference_commit = vcs.current_commit_hash()?;
    vcs.checkout(&base)?;

    Ok(StepCommits {
        base_commit,
        reference_commit,
    })
}

pub struct StepPipeline<'a, V: VersionControl + ?Sized> {
    pub vcs: &'a mut V,
    pub rewriter: &'a mut Rewriter,
    pub counter: &'a dyn TokenCounter,
    /// Minimum patch size, in tokens, for a step to be kept
    pub threshold: usize,
}

impl<V: VersionControl + ?Sized> StepPipeline<'_, V> {
    /// Materialize every step. Test ids accumulate into later steps' pass-to-pass lists.
    pub fn run(
        &mut self,
        project_root: &Path,
        steps: &[DevelopmentStep],
        docstrings: &DocstringMap,
    ) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut passing: Vec<String> = Vec::new();

        for step in steps {
            let files = self
                .rewriter
                .rewrite_step(project_root, step, docstrings)
                .with_context(|| format!("Failed to rewrite step {}", step.step))?;
            let commits = commit_step(&mut *self.vcs, step.step, &files)
                .with_context(|| format!("Failed to commit step {}", step.step))?;

            let reference_patch = generate_patch(&files.skeleton, &files.reference);
            let flag = is_nontrivial(self.counter, &reference_patch, self.threshold);
            log::info!(
                "Step {}: {} files, flag={flag}, oracle: {}",
                step.step,
                files.skeleton.len(),
                pytest_command(&step.test_ids)
            );

            outcomes.push(StepOutcome {
                step: step.step,
                skeleton_files: files.skeleton,
                reference_files: files.reference,
                reference_patch,
                fail_to_pass: step.test_ids.clone(),
                pass_to_pass: passing.clone(),
                base_commit: commits.base_commit,
                reference_commit: commits.reference_commit,
                flag,
            });
            passing.extend(step.test_ids.iter().cloned());
        }

        Ok(outcomes)
    }
}

/// Rebuild commit hashes, test lists and flags of earlier outcomes from an existing tree.
///
/// Hashes come from the `step-{n}-skeleton` and `step-{n}-reference` branches. Outcomes must
/// line up with `steps` one to one.
pub fn recover_outcomes<V: VersionControl + ?Sized>(
    vcs: &mut V,
    steps: &[DevelopmentStep],
    outcomes: Vec<StepOutcome>,
    counter: &dyn TokenCounter,
    threshold: usize,
) -> Result<Vec<StepOutcome>> {
    if steps.len() != outcomes.len() {
        anyhow::bail!(
            "Schedule has {} steps but {} outcomes were given",
            steps.len(),
            outcomes.len()
        );
    }

    let base = vcs.current_branch()?;
    let mut passing: Vec<String> = Vec::new();
    let mut recovered = Vec::with_capacity(outcomes.len());

    for (step, mut outcome) in steps.iter().zip(outcomes) {
        if step.step != outcome.step {
            anyhow::bail!(
                "Step {} does not match outcome step {}",
                step.step,
                outcome.step
            );
        }

        vcs.checkout(&skeleton_branch(step.step))?;
        outcome.base_commit = vcs.current_commit_hash()?;
        vcs.checkout(&reference_branch(step.step))?;
        outcome.reference_commit = vcs.current_commit_hash()?;

        outcome.fail_to_pass = step.test_ids.clone();
        outcome.pass_to_pass = passing.clone();
        outcome.flag = is_nontrivial(counter, &outcome.reference_patch, threshold);
        passing.extend(step.test_ids.iter().cloned());
        recovered.push(outcome);
    }

    vcs.checkout(&base)?;
    log::info!("Recovered commits for {} steps", recovered.len());
    Ok(recovered)
}
