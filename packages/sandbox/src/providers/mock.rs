use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ContainerSpec, ExecOutcome, ExecutionBackend};
use crate::error::Result;

/// Degraded-mode backend: every operation succeeds with a well-formed
/// response, so layers above never branch on backend availability.
#[derive(Debug, Default)]
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let id = format!("mock_{}", nanoid::nanoid!(12));
        debug!("Mock backend created container {} for {}", id, spec.name);
        Ok(id)
    }

    async fn exec(
        &self,
        container_id: &str,
        command: Vec<String>,
        _timeout: Duration,
    ) -> Result<ExecOutcome> {
        debug!(
            "Mock backend exec in {}: {:?} (no-op)",
            container_id, command
        );
        Ok(ExecOutcome {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            timed_out: false,
        })
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        debug!("Mock backend removed container {}", container_id);
        Ok(())
    }
}
