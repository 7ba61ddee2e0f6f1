// ABOUTME: Composition root owning the process-wide orchestration components
// ABOUTME: Dependency-injected construction with ordered teardown, no statics

use std::path::PathBuf;
use std::sync::Arc;

use switchboard_agents::{Agent, AgentConfig, AgentRegistry, AgentResult};
use switchboard_ai::{provider_from_env, CompletionProvider};
use switchboard_events::EventBus;
use switchboard_sandbox::{ExecutionBackend, SessionManager};
use switchboard_tasks::{TaskScheduler, DEFAULT_MAX_CONCURRENT};
use tracing::info;

/// Construction knobs for the runtime.
pub struct RuntimeConfig {
    pub max_concurrent_tasks: usize,
    pub sandbox_base_dir: PathBuf,
    /// Overrides env-based provider selection
    pub provider: Option<Arc<dyn CompletionProvider>>,
    /// Overrides sandbox backend probing (tests inject the mock here)
    pub sandbox_backend: Option<Arc<dyn ExecutionBackend>>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT,
            sandbox_base_dir: std::env::temp_dir().join("switchboard"),
            provider: None,
            sandbox_backend: None,
        }
    }
}

/// Owns the per-process instances of the core components: event bus, agent
/// registry, task scheduler, and sandbox session manager. Single-instance
/// semantics come from ownership here, not from globals, so tests stay
/// hermetic.
pub struct Runtime {
    bus: Arc<EventBus>,
    registry: AgentRegistry,
    scheduler: TaskScheduler,
    sandbox: Arc<SessionManager>,
    provider: Arc<dyn CompletionProvider>,
}

impl Runtime {
    pub async fn new(config: RuntimeConfig) -> Self {
        let bus = Arc::new(EventBus::new());
        let provider = config.provider.unwrap_or_else(provider_from_env);
        let sandbox = match config.sandbox_backend {
            Some(backend) => SessionManager::with_backend(backend, config.sandbox_base_dir),
            None => SessionManager::new(config.sandbox_base_dir).await,
        };

        info!(
            "Runtime up: provider={}, sandbox backend={}, max concurrent tasks={}",
            provider.name(),
            sandbox.backend_name(),
            config.max_concurrent_tasks
        );

        Self {
            bus,
            registry: AgentRegistry::with_builtin_types(),
            scheduler: TaskScheduler::new(config.max_concurrent_tasks),
            sandbox: Arc::new(sandbox),
            provider,
        }
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn sandbox(&self) -> Arc<SessionManager> {
        Arc::clone(&self.sandbox)
    }

    pub fn provider(&self) -> Arc<dyn CompletionProvider> {
        Arc::clone(&self.provider)
    }

    /// Create an agent wired to this runtime's bus and provider.
    pub fn create_agent(
        &self,
        agent_type: &str,
        config: AgentConfig,
    ) -> AgentResult<Arc<dyn Agent>> {
        self.registry
            .create_agent(agent_type, config, self.bus(), self.provider())
    }

    /// Tear everything down: sandbox sessions first (external resources),
    /// then tasks, agents, and finally the event log. Never errors.
    pub async fn shutdown(&self) {
        self.sandbox.cleanup().await;
        self.scheduler.clear_tasks().await;
        self.registry.clear();
        self.bus.clear();
        info!("Runtime shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switchboard_ai::PlaceholderProvider;
    use switchboard_sandbox::{Language, MockBackend};

    use super::*;

    async fn test_runtime(base_dir: &std::path::Path) -> Runtime {
        Runtime::new(RuntimeConfig {
            sandbox_base_dir: base_dir.to_path_buf(),
            provider: Some(Arc::new(PlaceholderProvider::new())),
            sandbox_backend: Some(Arc::new(MockBackend::new())),
            ..RuntimeConfig::default()
        })
        .await
    }

    #[tokio::test]
    async fn test_runtime_wires_components_together() {
        let base = tempfile::tempdir().unwrap();
        let runtime = test_runtime(base.path()).await;

        let agent = runtime
            .create_agent("developer", AgentConfig::named("dev", "writes code"))
            .unwrap();
        assert!(runtime.registry().get_agent(agent.id()).is_some());
        assert_eq!(runtime.sandbox().backend_name(), "mock");
        assert_eq!(runtime.provider().name(), "placeholder");
    }

    #[tokio::test]
    async fn test_shutdown_clears_all_process_state() {
        let base = tempfile::tempdir().unwrap();
        let runtime = test_runtime(base.path()).await;

        runtime
            .create_agent("thinking", AgentConfig::default())
            .unwrap();
        runtime.sandbox().create_session(Language::Python).await.unwrap();

        runtime.shutdown().await;

        assert!(runtime.registry().list_agents().is_empty());
        assert!(runtime.sandbox().list_sessions().await.is_empty());
        assert!(runtime.scheduler().list_tasks().is_empty());
        assert!(runtime.bus().is_empty());
    }
}
