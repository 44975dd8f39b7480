use anyhow::{Context as AnyhowContext, Result};
use devbench_rewriter::RewriterConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline configuration, read from an optional TOML file.
///
/// ```toml
/// [rewriter]
/// stub_statement = "raise NotImplementedError"
///
/// [textgen]
/// base_url = "http://localhost:8000/v1"
/// model = "Qwen2.5-Coder-32B-Instruct"
///
/// [dataset]
/// threshold = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rewriter: RewriterConfig,
    pub textgen: TextGenConfig,
    pub dataset: DatasetConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextGenConfig {
    /// OpenAI-compatible endpoint, without the `/chat/completions` suffix
    pub base_url: String,

    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Requests in flight at once
    pub max_concurrency: usize,

    /// Extra attempts after a failed request
    pub max_retries: usize,

    /// Demonstrations prepended to every request
    pub n_shots: usize,

    /// Directory with `docstring/` and `specification/` prompt overrides
    pub prompt_dir: Option<PathBuf>,
}

impl Default for TextGenConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "Qwen2.5-Coder-32B-Instruct".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_concurrency: 8,
            max_retries: 3,
            n_shots: 2,
            prompt_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Patches with fewer tokens than this are flagged as trivial
    pub threshold: usize,

    /// Repositories admitted into the benchmark
    pub repositories: Vec<String>,

    /// Per-repository cap of the lite split
    pub lite_cap: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            repositories: crate::dataset::DEFAULT_REPOSITORIES
                .iter()
                .map(|repo| repo.to_string())
                .collect(),
            lite_cap: crate::dataset::LITE_CAP,
        }
    }
}

impl Config {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.rewriter.validate()?;
        if self.textgen.max_concurrency == 0 {
            anyhow::bail!("textgen.max_concurrency must be greater than 0");
        }
        if self.textgen.base_url.trim().is_empty() {
            anyhow::bail!("textgen.base_url must not be empty");
        }
        if self.dataset.lite_cap == 0 {
            anyhow::bail!("dataset.lite_cap must be greater than 0");
        }
        Ok(())
    }
}
