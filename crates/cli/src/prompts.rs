use crate::textgen::{ChatMessage, ChatRequest};
use anyhow::{Context as AnyhowContext, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const SYSTEM_PROMPT_FILE: &str = "system-prompt.md";
const DEMONSTRATIONS_FILE: &str = "demonstrations.json";

const DOCSTRING_SYSTEM_PROMPT: &str = include_str!("../prompts/docstring/system-prompt.md");
const DOCSTRING_DEMONSTRATIONS: &str = include_str!("../prompts/docstring/demonstrations.json");
const SPECIFICATION_SYSTEM_PROMPT: &str =
    include_str!("../prompts/specification/system-prompt.md");
const SPECIFICATION_DEMONSTRATIONS: &str =
    include_str!("../prompts/specification/demonstrations.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Docstring,
    Specification,
}

impl PromptKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            PromptKind::Docstring => "docstring",
            PromptKind::Specification => "specification",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TurnContent {
    pub content: String,
}

/// One worked example: a user turn and the expected assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Demonstration {
    pub user: TurnContent,
    pub assistant: TurnContent,
}

/// System prompt plus demonstrations for one kind of request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub system_prompt: String,
    pub demonstrations: Vec<Demonstration>,
}

impl PromptSet {
    pub fn builtin(kind: PromptKind) -> Result<Self> {
        let (system_prompt, demonstrations) = match kind {
            PromptKind::Docstring => (DOCSTRING_SYSTEM_PROMPT, DOCSTRING_DEMONSTRATIONS),
            PromptKind::Specification => {
                (SPECIFICATION_SYSTEM_PROMPT, SPECIFICATION_DEMONSTRATIONS)
            }
        };
        Ok(Self {
            system_prompt: system_prompt.to_string(),
            demonstrations: serde_json::from_str(demonstrations)
                .with_context(|| format!("Invalid built-in {} demonstrations", kind.dir_name()))?,
        })
    }

    /// Read `system-prompt.md` and `demonstrations.json` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let prompt_path = dir.join(SYSTEM_PROMPT_FILE);
        let system_prompt = fs::read_to_string(&prompt_path)
            .with_context(|| format!("Failed to read {}", prompt_path.display()))?;
        let demos_path = dir.join(DEMONSTRATIONS_FILE);
        let raw = fs::read_to_string(&demos_path)
            .with_context(|| format!("Failed to read {}", demos_path.display()))?;
        let demonstrations = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid {}", demos_path.display()))?;
        Ok(Self {
            system_prompt,
            demonstrations,
        })
    }

    /// Prompts from `<prompt_dir>/<kind>/` when given, built-ins otherwise.
    pub fn load(kind: PromptKind, prompt_dir: Option<&Path>) -> Result<Self> {
        match prompt_dir {
            Some(dir) => {
                let dir = dir.join(kind.dir_name());
                log::info!("Loading {} prompts from {}", kind.dir_name(), dir.display());
                Self::from_dir(&dir)
            }
            None => Self::builtin(kind),
        }
    }

    /// System prompt, the first `n_shots` demonstrations as user/assistant pairs, then
    /// `content` as the final user turn.
    pub fn request(&self, model: &str, n_shots: usize, content: impl Into<String>) -> ChatRequest {
        let mut messages = vec![ChatMessage::system(self.system_prompt.as_str())];
        for demo in self.demonstrations.iter().take(n_shots) {
            messages.push(ChatMessage::user(demo.user.content.as_str()));
            messages.push(ChatMessage::assistant(demo.assistant.content.as_str()));
        }
        messages.push(ChatMessage::user(content));
        ChatRequest {
            model: model.to_string(),
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textgen::ChatRole;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_sets_have_demonstrations() {
        for kind in [PromptKind::Docstring, PromptKind::Specification] {
            let set = PromptSet::builtin(kind).unwrap();
            assert!(!set.system_prompt.trim().is_empty());
            assert!(set.demonstrations.len() >= 2);
        }
    }

    #[test]
    fn request_interleaves_shots_before_content() {
        let set = PromptSet::builtin(PromptKind::Docstring).unwrap();
        let request = set.request("m", 2, "def f():\n    return 1");

        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
            ]
        );
        assert_eq!(request.messages[1].content, set.demonstrations[0].user.content);
        assert_eq!(
            request.messages.last().map(|m| m.content.as_str()),
            Some("def f():\n    return 1")
        );
        assert_eq!(request.model, "m");
    }

    #[test]
    fn zero_shots_sends_system_and_content_only() {
        let set = PromptSet::builtin(PromptKind::Specification).unwrap();
        assert_eq!(set.request("m", 0, "x").messages.len(), 2);
    }

    #[test]
    fn directory_overrides_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let kind_dir = dir.path().join("docstring");
        fs::create_dir_all(&kind_dir).unwrap();
        fs::write(kind_dir.join(SYSTEM_PROMPT_FILE), "Be brief.").unwrap();
        fs::write(
            kind_dir.join(DEMONSTRATIONS_FILE),
            r#"[{"user": {"content": "u"}, "assistant": {"content": "a"}}]"#,
        )
        .unwrap();

        let set = PromptSet::load(PromptKind::Docstring, Some(dir.path())).unwrap();
        assert_eq!(set.system_prompt, "Be brief.");
        assert_eq!(set.demonstrations.len(), 1);
        assert!(PromptSet::load(PromptKind::Specification, Some(dir.path())).is_err());
    }

    #[test]
    fn request_serializes_as_chat_completion_body() {
        let set = PromptSet {
            system_prompt: "s".into(),
            demonstrations: vec![],
        };
        let value = serde_json::to_value(set.request("model-x", 2, "hi")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "model-x",
                "messages": [
                    {"role": "system", "content": "s"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }
}
