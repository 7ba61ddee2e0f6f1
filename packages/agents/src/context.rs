// ABOUTME: Shared agent internals: prompt assembly, rolling history, action mapping
// ABOUTME: Composition helper wrapped by every agent variant

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use switchboard_ai::{
    ChatMessage, Completion, CompletionOptions, CompletionProvider, ToolSpec,
};
use switchboard_events::{Action, ActionPayload, EventBus, FileOp, Observation};
use tracing::warn;

use crate::agent::{AgentConfig, AgentResult};

/// Rolling history keeps at most this many entries; oldest are dropped.
pub const HISTORY_LIMIT: usize = 5;

/// Everything an agent variant needs besides its defaults: identity, the bus
/// it publishes to, the completion provider it calls, and a small bounded
/// history of recent calls used as extra context.
pub struct AgentContext {
    id: String,
    name: String,
    description: String,
    system_prompt: String,
    tools: Vec<ToolSpec>,
    bus: Arc<EventBus>,
    provider: Arc<dyn CompletionProvider>,
    history: Mutex<VecDeque<String>>,
}

impl AgentContext {
    pub fn new(
        config: AgentConfig,
        default_system_prompt: &str,
        mut default_tools: Vec<ToolSpec>,
        bus: Arc<EventBus>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        default_tools.extend(config.tools);

        Self {
            id: config
                .id
                .unwrap_or_else(|| format!("agent_{}", nanoid::nanoid!(8))),
            name: config.name,
            description: config.description,
            system_prompt: config
                .system_prompt
                .unwrap_or_else(|| default_system_prompt.to_string()),
            tools: default_tools,
            bus,
            provider,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Run one observation through the provider and map the completion into
    /// exactly one action, recording a bounded summary of the call.
    pub async fn process_observation(&self, observation: &Observation) -> AgentResult<Action> {
        let messages = self.build_messages(observation);
        let options = CompletionOptions::with_tools(self.tools.clone());

        let completion = self
            .provider
            .generate_chat_completion(&messages, &options)
            .await?;

        let action = self.action_from(&completion);
        self.record(format!(
            "observation {} => {} action",
            observation.id,
            action.payload.name()
        ));
        Ok(action)
    }

    pub fn reset(&self) {
        self.history.lock().expect("history lock poisoned").clear();
    }

    pub fn history_snapshot(&self) -> Vec<String> {
        self.history
            .lock()
            .expect("history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    fn build_messages(&self, observation: &Observation) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(&self.system_prompt)];

        let history = self.history.lock().expect("history lock poisoned");
        if !history.is_empty() {
            let lines: Vec<String> = history.iter().map(|entry| format!("- {}", entry)).collect();
            messages.push(ChatMessage::system(format!(
                "Recent activity:\n{}",
                lines.join("\n")
            )));
        }
        drop(history);

        messages.push(ChatMessage::user(render_observation(observation)));
        messages
    }

    fn record(&self, summary: String) {
        let mut history = self.history.lock().expect("history lock poisoned");
        history.push_back(summary);
        while history.len() > HISTORY_LIMIT {
            history.pop_front();
        }
    }

    /// Deterministic completion → action mapping. The first tool call wins;
    /// anything unmappable degrades to a plain message action.
    fn action_from(&self, completion: &Completion) -> Action {
        let Some(call) = completion.tool_calls.first() else {
            return Action::new(
                &self.id,
                ActionPayload::Message {
                    content: completion.content.clone(),
                },
            );
        };

        let payload = match call.name.as_str() {
            "execute_code" => string_arg(&call.arguments, "code").map(|code| {
                ActionPayload::CodeExecution {
                    code,
                    language: string_arg(&call.arguments, "language")
                        .unwrap_or_else(|| "python".to_string()),
                }
            }),
            "run_shell_command" => string_arg(&call.arguments, "command")
                .map(|command| ActionPayload::ShellCommand { command }),
            "file_operation" => {
                let operation = call
                    .arguments
                    .get("operation")
                    .cloned()
                    .and_then(|v| serde_json::from_value::<FileOp>(v).ok());
                match (operation, string_arg(&call.arguments, "path")) {
                    (Some(operation), Some(path)) => Some(ActionPayload::FileOperation {
                        operation,
                        path,
                        content: string_arg(&call.arguments, "content"),
                    }),
                    _ => None,
                }
            }
            "web_search" => {
                string_arg(&call.arguments, "query").map(|query| ActionPayload::WebSearch { query })
            }
            "complete_task" => Some(ActionPayload::TaskCompletion {
                summary: string_arg(&call.arguments, "summary")
                    .unwrap_or_else(|| completion.content.clone()),
                result: call.arguments.get("result").cloned(),
            }),
            _ => None,
        };

        match payload {
            Some(payload) => Action::new(&self.id, payload),
            None => {
                warn!(
                    "agent {} could not map tool call '{}'; falling back to message",
                    self.id, call.name
                );
                let content = if completion.content.is_empty() {
                    call.arguments.to_string()
                } else {
                    completion.content.clone()
                };
                Action::new(&self.id, ActionPayload::Message { content })
            }
        }
    }
}

fn render_observation(observation: &Observation) -> String {
    let body = match &observation.result {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    if observation.action_id.is_empty() {
        body
    } else {
        let status = if observation.success {
            "succeeded"
        } else {
            "failed"
        };
        format!(
            "Action {} {}. Result: {}",
            observation.action_id, status, body
        )
    }
}

fn string_arg(arguments: &Value, key: &str) -> Option<String> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
