// ABOUTME: The closed set of agent variants: thinking, developer, editor, orchestrator
// ABOUTME: Each wraps AgentContext with its own default prompt and tool list

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use switchboard_ai::{CompletionProvider, ToolSpec};
use switchboard_events::{Action, EventBus, Observation};

use crate::agent::{Agent, AgentConfig, AgentResult};
use crate::context::AgentContext;

const THINKING_PROMPT: &str = "You are a reasoning agent. Think through the observation step \
by step and reply with your analysis as plain text. You have no tools.";

const DEVELOPER_PROMPT: &str = "You are a software developer agent. Solve programming tasks by \
calling the execute_code tool with complete, runnable code. Prefer small, self-contained \
programs that print their result.";

const EDITOR_PROMPT: &str = "You are a file editor agent. Inspect and modify workspace files \
using the file_operation tool. Make the smallest change that satisfies the request.";

const ORCHESTRATOR_PROMPT: &str = "You are an orchestrator agent. Break work into steps, \
gather what you need with web_search, and call complete_task with a summary when the overall \
goal is achieved.";

fn execute_code_tool() -> ToolSpec {
    ToolSpec {
        name: "execute_code".to_string(),
        description: "Execute code in an isolated sandbox session".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Complete source to run"},
                "language": {"type": "string", "enum": ["python", "javascript", "shell"]}
            },
            "required": ["code", "language"]
        }),
    }
}

fn run_shell_command_tool() -> ToolSpec {
    ToolSpec {
        name: "run_shell_command".to_string(),
        description: "Run a shell command in the sandbox session".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"}
            },
            "required": ["command"]
        }),
    }
}

fn file_operation_tool() -> ToolSpec {
    ToolSpec {
        name: "file_operation".to_string(),
        description: "Read, write, delete, or list files in the session workspace".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["read", "write", "delete", "list"]},
                "path": {"type": "string", "description": "Path relative to the workspace root"},
                "content": {"type": "string", "description": "New content for write operations"}
            },
            "required": ["operation", "path"]
        }),
    }
}

fn web_search_tool() -> ToolSpec {
    ToolSpec {
        name: "web_search".to_string(),
        description: "Search the web for supporting information".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"}
            },
            "required": ["query"]
        }),
    }
}

fn complete_task_tool() -> ToolSpec {
    ToolSpec {
        name: "complete_task".to_string(),
        description: "Mark the overall task as finished with a summary".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"},
                "result": {"description": "Optional structured result"}
            },
            "required": ["summary"]
        }),
    }
}

macro_rules! delegate_agent_impl {
    ($variant:ty) => {
        #[async_trait]
        impl Agent for $variant {
            fn id(&self) -> &str {
                self.context.id()
            }

            fn name(&self) -> &str {
                self.context.name()
            }

            fn description(&self) -> &str {
                self.context.description()
            }

            async fn process(&self, observation: &Observation) -> AgentResult<Action> {
                self.context.process_observation(observation).await
            }

            fn reset(&self) {
                self.context.reset()
            }
        }
    };
}

/// Pure-reasoning agent: declares no tools, so it always yields message actions.
pub struct ThinkingAgent {
    context: AgentContext,
}

impl ThinkingAgent {
    pub fn new(
        config: AgentConfig,
        bus: Arc<EventBus>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            context: AgentContext::new(config, THINKING_PROMPT, Vec::new(), bus, provider),
        }
    }
}

delegate_agent_impl!(ThinkingAgent);

/// Writes and runs code via the sandbox tools.
pub struct DeveloperAgent {
    context: AgentContext,
}

impl DeveloperAgent {
    pub fn new(
        config: AgentConfig,
        bus: Arc<EventBus>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let tools = vec![
            execute_code_tool(),
            run_shell_command_tool(),
            file_operation_tool(),
        ];
        Self {
            context: AgentContext::new(config, DEVELOPER_PROMPT, tools, bus, provider),
        }
    }
}

delegate_agent_impl!(DeveloperAgent);

/// Works on workspace files only.
pub struct EditorAgent {
    context: AgentContext,
}

impl EditorAgent {
    pub fn new(
        config: AgentConfig,
        bus: Arc<EventBus>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            context: AgentContext::new(
                config,
                EDITOR_PROMPT,
                vec![file_operation_tool()],
                bus,
                provider,
            ),
        }
    }
}

delegate_agent_impl!(EditorAgent);

/// Coordinates multi-step work and signals completion.
pub struct OrchestratorAgent {
    context: AgentContext,
}

impl OrchestratorAgent {
    pub fn new(
        config: AgentConfig,
        bus: Arc<EventBus>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let tools = vec![complete_task_tool(), web_search_tool()];
        Self {
            context: AgentContext::new(config, ORCHESTRATOR_PROMPT, tools, bus, provider),
        }
    }
}

delegate_agent_impl!(OrchestratorAgent);
