//! Chat-completion collaborator used for docstrings and specifications.

use crate::config::TextGenConfig;
use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Produces one completion per request.
///
/// The result is index-aligned with `requests`; `None` marks a request that produced nothing
/// usable and whose sample should be skipped.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, requests: Vec<ChatRequest>) -> Vec<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_concurrency: usize,
    max_retries: usize,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            max_concurrency: 8,
            max_retries: 3,
        })
    }

    /// Build from config; the key comes from the configured environment variable.
    pub fn from_config(config: &TextGenConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            log::warn!(
                "{} is not set; sending requests without authorization",
                config.api_key_env
            );
        }
        Ok(Self::new(&config.base_url, api_key)?
            .with_concurrency(config.max_concurrency)
            .with_retries(config.max_retries))
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn complete_once(&self, request: &ChatRequest) -> Result<Option<String>> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response: ChatResponse = builder
            .send()
            .await
            .context("Request failed")?
            .error_for_status()
            .context("Endpoint returned an error status")?
            .json()
            .await
            .context("Invalid chat completion response")?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }

    async fn complete(&self, index: usize, request: &ChatRequest) -> Option<String> {
        let mut attempt = 0usize;
        loop {
            match self.complete_once(request).await {
                Ok(content) => return content,
                Err(err) if attempt < self.max_retries => {
                    let delay = Duration::from_millis(500 * (1u64 << attempt.min(6)));
                    log::debug!("Request {index} failed ({err:#}); retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    log::warn!("Request {index} failed after {} attempts: {err:#}", attempt + 1);
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatClient {
    async fn generate(&self, requests: Vec<ChatRequest>) -> Vec<Option<String>> {
        let total = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let client = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, client.complete(index, &request).await)
            });
        }

        let mut results = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, content)) => results[index] = content,
                Err(err) => log::warn!("Generation task failed: {err}"),
            }
        }

        let answered = results.iter().filter(|r| r.is_some()).count();
        log::info!("Text generation: {answered}/{total} requests answered");
        results
    }
}
