// ABOUTME: Agent variants and registry for switchboard
// ABOUTME: Observations in, typed actions out, via an LLM completion provider

pub mod agent;
pub mod context;
pub mod registry;
pub mod variants;

pub use agent::{Agent, AgentConfig, AgentError, AgentResult};
pub use context::{AgentContext, HISTORY_LIMIT};
pub use registry::{AgentFactory, AgentRegistry};
pub use variants::{DeveloperAgent, EditorAgent, OrchestratorAgent, ThinkingAgent};
