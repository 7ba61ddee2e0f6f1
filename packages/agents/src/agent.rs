use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_ai::{ProviderError, ToolSpec};
use switchboard_events::{Action, Observation};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Configuration applied exactly once, at construction.
///
/// There is deliberately no re-initialization surface: identity, system
/// prompt, and tool list are fixed for an agent's lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Explicit agent ID; generated when absent
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    /// Overrides the variant's default system prompt
    pub system_prompt: Option<String>,
    /// Extra tools declared on top of the variant's defaults
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

impl AgentConfig {
    pub fn named(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }
}

/// A unit that turns observations into actions, backed by an LLM call.
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Consume one observation and produce exactly one action.
    async fn process(&self, observation: &Observation) -> AgentResult<Action>;

    /// Clear the rolling history; identity is unaffected.
    fn reset(&self);
}
