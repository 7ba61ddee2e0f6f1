// ABOUTME: LLM completion provider boundary for switchboard
// ABOUTME: Anthropic-backed implementation with a labeled placeholder fallback

pub mod anthropic;
pub mod placeholder;
pub mod provider;

use std::sync::Arc;

use tracing::info;

pub use anthropic::AnthropicProvider;
pub use placeholder::{PlaceholderProvider, PLACEHOLDER_PREFIX};
pub use provider::{
    ChatMessage, Completion, CompletionOptions, CompletionProvider, ProviderError, ProviderResult,
    Role, ToolCall, ToolSpec,
};

/// Select a provider from the environment: Anthropic when `ANTHROPIC_API_KEY`
/// is set, otherwise the labeled placeholder. Absence of a key degrades,
/// never crashes.
pub fn provider_from_env() -> Arc<dyn CompletionProvider> {
    match AnthropicProvider::from_env() {
        Ok(provider) => Arc::new(provider),
        Err(_) => {
            info!("ANTHROPIC_API_KEY not set - using placeholder completion provider");
            Arc::new(PlaceholderProvider::new())
        }
    }
}
