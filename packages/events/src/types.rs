// ABOUTME: Event envelope types carried by the orchestration bus
// ABOUTME: Defines actions, observations, and their typed payloads

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subscription tag shared by all observations.
pub const OBSERVATION_KIND: &str = "observation";

/// Origin of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    User,
    Agent,
    System,
    Runtime,
}

/// File operation carried by a `file_operation` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    Read,
    Write,
    Delete,
    List,
}

/// Typed payload of an action, tagged by the action name.
///
/// The tag doubles as the bus subscription kind, so subscribers get a
/// compile-time-checked payload shape for each action name they handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "parameters", rename_all = "snake_case")]
pub enum ActionPayload {
    Message {
        content: String,
    },
    SystemMessage {
        content: String,
    },
    CodeExecution {
        code: String,
        language: String,
    },
    ShellCommand {
        command: String,
    },
    FileOperation {
        operation: FileOp,
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    WebSearch {
        query: String,
    },
    TaskCompletion {
        summary: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
}

impl ActionPayload {
    /// Subscription kind for this payload, matching the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            ActionPayload::Message { .. } => "message",
            ActionPayload::SystemMessage { .. } => "system_message",
            ActionPayload::CodeExecution { .. } => "code_execution",
            ActionPayload::ShellCommand { .. } => "shell_command",
            ActionPayload::FileOperation { .. } => "file_operation",
            ActionPayload::WebSearch { .. } => "web_search",
            ActionPayload::TaskCompletion { .. } => "task_completion",
        }
    }
}

/// Something an agent wants done. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique action ID
    pub id: String,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Origin of the action
    pub source: EventSource,
    /// Agent that owns this action
    pub agent_id: String,
    /// Typed action payload
    #[serde(flatten)]
    pub payload: ActionPayload,
    /// Additional structured metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Action {
    /// Create an agent-sourced action.
    pub fn new(agent_id: impl Into<String>, payload: ActionPayload) -> Self {
        Self::from_source(EventSource::Agent, agent_id, payload)
    }

    pub fn from_source(
        source: EventSource,
        agent_id: impl Into<String>,
        payload: ActionPayload,
    ) -> Self {
        Self {
            id: format!("act_{}", nanoid::nanoid!(12)),
            timestamp: Utc::now(),
            source,
            agent_id: agent_id.into(),
            payload,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// The result of an action, published by whatever executed it.
///
/// `action_id` is a lookup key back to the action it answers, not an owning
/// reference. Every action yields at most one matching observation, with no
/// bounded delivery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Unique observation ID
    pub id: String,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Origin of the observation
    pub source: EventSource,
    /// ID of the action this observation answers
    pub action_id: String,
    /// Whether the action succeeded
    pub success: bool,
    /// Arbitrary result payload
    pub result: Value,
    /// Additional structured metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Observation {
    pub fn new(
        source: EventSource,
        action_id: impl Into<String>,
        success: bool,
        result: Value,
    ) -> Self {
        Self {
            id: format!("obs_{}", nanoid::nanoid!(12)),
            timestamp: Utc::now(),
            source,
            action_id: action_id.into(),
            success,
            result,
            metadata: None,
        }
    }

    /// Runtime-sourced observation answering `action`.
    pub fn for_action(action: &Action, success: bool, result: Value) -> Self {
        Self::new(EventSource::Runtime, action.id.clone(), success, result)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// Envelope carried by the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    Action(Action),
    Observation(Observation),
}

impl Event {
    /// Dynamic subscription kind: the action name, or `"observation"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Action(action) => action.payload.name(),
            Event::Observation(_) => OBSERVATION_KIND,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Event::Action(action) => &action.id,
            Event::Observation(observation) => &observation.id,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Event::Action(action) => Some(action),
            Event::Observation(_) => None,
        }
    }

    pub fn as_observation(&self) -> Option<&Observation> {
        match self {
            Event::Action(_) => None,
            Event::Observation(observation) => Some(observation),
        }
    }
}

impl From<Action> for Event {
    fn from(action: Action) -> Self {
        Event::Action(action)
    }
}

impl From<Observation> for Event {
    fn from(observation: Observation) -> Self {
        Event::Observation(observation)
    }
}
