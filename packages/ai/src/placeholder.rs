use async_trait::async_trait;

use crate::provider::{
    ChatMessage, Completion, CompletionOptions, CompletionProvider, ProviderResult, Role,
};

pub const PLACEHOLDER_PREFIX: &str = "[placeholder]";

/// Stand-in provider selected when no real backend is available.
///
/// Always succeeds, never emits tool calls, and labels its output so the
/// degraded mode is visible downstream.
#[derive(Debug, Default)]
pub struct PlaceholderProvider;

impl PlaceholderProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionProvider for PlaceholderProvider {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> ProviderResult<Completion> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        Ok(Completion {
            content: format!(
                "{} No LLM provider is configured; received: {}",
                PLACEHOLDER_PREFIX, last_user
            ),
            tool_calls: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_is_labeled_and_tool_free() {
        let provider = PlaceholderProvider::new();
        let completion = provider
            .generate_chat_completion(
                &[ChatMessage::user("write a poem")],
                &CompletionOptions::default(),
            )
            .await
            .unwrap();

        assert!(completion.content.starts_with(PLACEHOLDER_PREFIX));
        assert!(completion.content.contains("write a poem"));
        assert!(completion.tool_calls.is_empty());
    }
}
