// ABOUTME: Agent registry mapping type names to factories and ids to live agents
// ABOUTME: Explicitly constructed and owned by the composition root, never a static

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use switchboard_ai::CompletionProvider;
use switchboard_events::EventBus;
use tracing::debug;

use crate::agent::{Agent, AgentConfig, AgentError, AgentResult};
use crate::variants::{DeveloperAgent, EditorAgent, OrchestratorAgent, ThinkingAgent};

/// Constructs a fully-initialized agent from its config and collaborators.
pub type AgentFactory =
    Box<dyn Fn(AgentConfig, Arc<EventBus>, Arc<dyn CompletionProvider>) -> Arc<dyn Agent> + Send + Sync>;

/// Catalog of agent-type factories plus the map of live instances.
#[derive(Default)]
pub struct AgentRegistry {
    factories: RwLock<HashMap<String, AgentFactory>>,
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the builtin variants.
    pub fn with_builtin_types() -> Self {
        let registry = Self::new();
        registry.register_type("thinking", |config, bus, provider| {
            Arc::new(ThinkingAgent::new(config, bus, provider))
        });
        registry.register_type("developer", |config, bus, provider| {
            Arc::new(DeveloperAgent::new(config, bus, provider))
        });
        registry.register_type("editor", |config, bus, provider| {
            Arc::new(EditorAgent::new(config, bus, provider))
        });
        registry.register_type("orchestrator", |config, bus, provider| {
            Arc::new(OrchestratorAgent::new(config, bus, provider))
        });
        registry
    }

    /// Register a factory under a type name. Re-registering a name overwrites
    /// the previous factory silently; last write wins. This is intentional, so
    /// embedders can replace builtin variants.
    pub fn register_type<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(AgentConfig, Arc<EventBus>, Arc<dyn CompletionProvider>) -> Arc<dyn Agent>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let mut factories = self.factories.write().expect("registry lock poisoned");
        if factories.insert(name.clone(), Box::new(factory)).is_some() {
            debug!("agent type '{}' re-registered; previous factory replaced", name);
        }
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.factories
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Construct, store, and return an agent of the given type.
    pub fn create_agent(
        &self,
        agent_type: &str,
        config: AgentConfig,
        bus: Arc<EventBus>,
        provider: Arc<dyn CompletionProvider>,
    ) -> AgentResult<Arc<dyn Agent>> {
        let factories = self.factories.read().expect("registry lock poisoned");
        let factory = factories
            .get(agent_type)
            .ok_or_else(|| AgentError::UnknownAgentType(agent_type.to_string()))?;

        let agent = factory(config, bus, provider);
        drop(factories);

        self.agents
            .write()
            .expect("registry lock poisoned")
            .insert(agent.id().to_string(), Arc::clone(&agent));
        Ok(agent)
    }

    pub fn get_agent(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn list_agents(&self) -> Vec<Arc<dyn Agent>> {
        self.agents
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn remove_agent(&self, id: &str) -> bool {
        self.agents
            .write()
            .expect("registry lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Drop all live agents. Registered types survive.
    pub fn clear(&self) {
        self.agents.write().expect("registry lock poisoned").clear();
    }
}
