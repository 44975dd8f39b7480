//! # Devbench CLI
//!
//! Pipeline stages on top of the analysis crates:
//!
//! ```text
//! traces ──> schedule ──┬──> docstrings ──────┐
//!                       ├──> specifications ──┼──> merge ──> bench
//!                       └──> codebase ────────┘
//!                              (commits recovers an existing tree)
//! ```

use anyhow::{Context as AnyhowContext, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub mod config;
pub mod dataset;
pub mod pipeline;
pub mod prompts;
pub mod samples;
pub mod textgen;
pub mod tokens;
pub mod vcs;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Saved {}", path.display());
    Ok(())
}

/// Write `text` and a newline to stdout, treating a closed pipe as success.
pub fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}
