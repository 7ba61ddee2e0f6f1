// ABOUTME: Completion provider trait and shared chat/tool-call types
// ABOUTME: Defines the boundary contract agents use to request completions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("No API key configured")]
    NoApiKey,

    #[error("Invalid response format")]
    InvalidResponse,
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool an agent declares to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments
    pub input_schema: Value,
}

/// A structured tool invocation returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Result of a chat completion call.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Concatenated text content
    pub content: String,
    /// Structured tool calls, in response order
    pub tool_calls: Vec<ToolCall>,
}

/// Knobs for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub tools: Vec<ToolSpec>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            tools: Vec::new(),
        }
    }
}

impl CompletionOptions {
    pub fn with_tools(tools: Vec<ToolSpec>) -> Self {
        Self {
            tools,
            ..Self::default()
        }
    }
}

/// Boundary contract for LLM completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Request one chat completion. Tool specs in `options` let the model
    /// answer with structured tool calls instead of plain text.
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> ProviderResult<Completion>;

    fn name(&self) -> &str;
}
