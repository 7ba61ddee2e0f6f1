// ABOUTME: Execution backend trait for sandbox container runtimes
// ABOUTME: Docker implementation plus a no-op mock selected at construction

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub mod docker;
pub mod mock;

pub use docker::DockerBackend;
pub use mock::MockBackend;

/// Configuration for a session's backing container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    /// Host directory bind-mounted at /workspace inside the container
    pub workspace_dir: PathBuf,
    pub memory_mb: u64,
    pub cpu_cores: f64,
    pub labels: HashMap<String, String>,
}

/// Raw result of executing a command inside a container.
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// The command hit its wall-clock timeout and was reaped
    pub timed_out: bool,
}

/// Container runtime seam for sandbox sessions.
///
/// Two implementations: `DockerBackend` for real isolation, and `MockBackend`
/// chosen at construction time when Docker cannot be reached, so callers above
/// this layer never special-case its absence.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create and start a long-lived idle container for a session.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Run a command in the container with a hard wall-clock timeout,
    /// capturing stdout and stderr separately.
    async fn exec(
        &self,
        container_id: &str,
        command: Vec<String>,
        timeout: Duration,
    ) -> Result<ExecOutcome>;

    /// Stop and remove the container. Tolerates already-gone containers.
    async fn remove_container(&self, container_id: &str) -> Result<()>;
}
