//! Version-control collaborator: a git working tree driven through the `git` binary.

use anyhow::{Context as AnyhowContext, Result};
use devbench_protocol::FileContent;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

pub const BASE_BRANCH: &str = "main";
pub const COMMITTER_NAME: &str = "devbench";
pub const COMMITTER_EMAIL: &str = "devbench@devbench.dev";
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial test commit";

const CACHE_DIRS: [&str; 2] = ["__pycache__", ".pytest_cache"];

/// Operations the step pipeline needs from a working tree.
///
/// Mutating operations take `&mut self`: a single writer drives the tree sequentially.
pub trait VersionControl {
    /// Create `branch` at the current commit and switch to it.
    fn create_and_checkout(&mut self, branch: &str) -> Result<()>;

    /// Write files relative to the tree root, creating parent directories.
    fn write_files(&mut self, files: &[FileContent]) -> Result<()>;

    /// Stage everything and commit, even when nothing changed.
    fn commit(&mut self, message: &str) -> Result<()>;

    fn checkout(&mut self, branch: &str) -> Result<()>;

    fn current_commit_hash(&self) -> Result<String>;

    fn current_branch(&self) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GitWorkingTree {
    root: PathBuf,
}

impl GitWorkingTree {
    /// Attach to an existing repository.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let tree = Self { root: root.into() };
        tree.git(&["rev-parse", "--git-dir"])
            .with_context(|| format!("{} is not a git repository", tree.root.display()))?;
        Ok(tree)
    }

    /// Copy `project_root` into `workdir`, clean it, and start a fresh history on `main`.
    pub fn init_from(project_root: &Path, workdir: &Path) -> Result<Self> {
        let copied = copy_tree(project_root, workdir)?;
        log::info!(
            "Copied {copied} files from {} to {}",
            project_root.display(),
            workdir.display()
        );
        clean_codebase(workdir)?;

        let tree = Self {
            root: workdir.to_path_buf(),
        };
        tree.git(&["init", "--initial-branch", BASE_BRANCH])?;
        tree.git(&["config", "user.name", COMMITTER_NAME])?;
        tree.git(&["config", "user.email", COMMITTER_EMAIL])?;
        tree.git(&["config", "commit.gpgsign", "false"])?;
        tree.stage_and_commit(INITIAL_COMMIT_MESSAGE)?;
        Ok(tree)
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .context("Failed to run git")?;
        if !output.status.success() {
            anyhow::bail!(
                "git {} failed in {}: {}",
                args.join(" "),
                self.root.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn stage_and_commit(&self, message: &str) -> Result<()> {
        self.git(&["add", "--all"])?;
        self.git(&["commit", "--allow-empty", "--no-verify", "-m", message])?;
        Ok(())
    }
}

impl VersionControl for GitWorkingTree {
    fn create_and_checkout(&mut self, branch: &str) -> Result<()> {
        self.git(&["checkout", "-b", branch])?;
        Ok(())
    }

    fn write_files(&mut self, files: &[FileContent]) -> Result<()> {
        for file in files {
            let path = self.root.join(&file.filepath);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, &file.content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<()> {
        self.stage_and_commit(message)
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        self.git(&["checkout", branch])?;
        Ok(())
    }

    fn current_commit_hash(&self) -> Result<String> {
        self.git(&["rev-parse", "HEAD"])
    }

    fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }
}

/// Copy every file under `src` into `dst`, skipping `.git` directories. Returns the file count.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0usize;
    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub cache_dirs: Vec<PathBuf>,
    pub core_dumps: Vec<PathBuf>,
}

/// Remove Python and pytest cache directories and `core.<pid>` dump files under `root`.
pub fn clean_codebase(root: &Path) -> Result<CleanReport> {
    let core_dump = Regex::new(r"^core\.\d+$")?;
    let mut report = CleanReport::default();

    let mut walker = WalkDir::new(root).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() && CACHE_DIRS.iter().any(|dir| *dir == name) {
            report.cache_dirs.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        } else if entry.file_type().is_file() && core_dump.is_match(&name) {
            report.core_dumps.push(entry.path().to_path_buf());
        }
    }

    for dir in &report.cache_dirs {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
        log::debug!("Deleted cache folder: {}", dir.display());
    }
    for file in &report.core_dumps {
        fs::remove_file(file).with_context(|| format!("Failed to remove {}", file.display()))?;
        log::debug!("Deleted core dump file: {}", file.display());
    }
    Ok(report)
}
