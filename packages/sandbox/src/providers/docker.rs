// ABOUTME: Docker execution backend for sandbox sessions via bollard
// ABOUTME: Hardened containers: no network, capped resources, dropped privileges

use std::time::Duration;

use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, RestartContainerOptions,
        StartContainerOptions, StopContainerOptions,
    },
    errors::Error as BollardError,
    exec::{CreateExecOptions, StartExecResults},
    models::HostConfig,
    Docker,
};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::{ContainerSpec, ExecOutcome, ExecutionBackend};
use crate::error::{Result, SandboxError};

/// CPU quota denominator: 100000 microseconds = one full core.
const CPU_PERIOD: i64 = 100_000;

/// Grace period before a container stop escalates to SIGKILL.
const STOP_TIMEOUT_SECS: i64 = 5;

pub struct DockerBackend {
    client: Docker,
}

impl DockerBackend {
    /// Connect to the Docker daemon and verify it responds. Failure here is
    /// how the session manager decides to fall back to the mock backend.
    pub async fn connect() -> Result<Self> {
        let client = Docker::connect_with_defaults()?;
        client.ping().await.map_err(|e| {
            warn!("Docker daemon not reachable: {}", e);
            SandboxError::Docker(e)
        })?;

        info!("Connected to Docker daemon");
        Ok(Self { client })
    }

    pub fn with_client(client: Docker) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutionBackend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        debug!("Creating session container {} from {}", spec.name, spec.image);

        let host_config = HostConfig {
            // Untrusted code gets no network at all.
            network_mode: Some("none".to_string()),
            memory: Some((spec.memory_mb * 1024 * 1024) as i64),
            cpu_quota: Some((spec.cpu_cores * CPU_PERIOD as f64) as i64),
            cpu_period: Some(CPU_PERIOD),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges:true".to_string()]),
            privileged: Some(false),
            binds: Some(vec![format!(
                "{}:/workspace",
                spec.workspace_dir.display()
            )]),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            // Keep the container idle between exec calls.
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            working_dir: Some("/workspace".to_string()),
            labels: Some(spec.labels.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let container = self
            .client
            .create_container(Some(options), config)
            .await
            .map_err(|e| {
                error!("Failed to create container {}: {}", spec.name, e);
                SandboxError::Docker(e)
            })?;

        self.client
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| {
                error!("Failed to start container {}: {}", container.id, e);
                SandboxError::Docker(e)
            })?;

        info!("Started session container {}", container.id);
        Ok(container.id)
    }

    async fn exec(
        &self,
        container_id: &str,
        command: Vec<String>,
        timeout: Duration,
    ) -> Result<ExecOutcome> {
        debug!("Executing in container {}: {:?}", container_id, command);

        let exec_config = CreateExecOptions {
            cmd: Some(command),
            working_dir: Some("/workspace".to_string()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self.client.create_exec(container_id, exec_config).await?;
        let start_result = self.client.start_exec(&exec.id, None).await?;

        let collect = async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();

            match start_result {
                StartExecResults::Attached { mut output, .. } => {
                    while let Some(msg) = output.next().await {
                        match msg {
                            Ok(LogOutput::StdOut { message }) => {
                                stdout.extend_from_slice(&message)
                            }
                            Ok(LogOutput::StdErr { message }) => {
                                stderr.extend_from_slice(&message)
                            }
                            Ok(LogOutput::Console { message }) => {
                                stdout.extend_from_slice(&message)
                            }
                            Ok(_) => {}
                            Err(e) => return Err(SandboxError::Docker(e)),
                        }
                    }
                }
                StartExecResults::Detached => {
                    return Err(SandboxError::Backend(
                        "Exec was detached unexpectedly".to_string(),
                    ))
                }
            }

            Ok((stdout, stderr))
        };

        match tokio::time::timeout(timeout, collect).await {
            Ok(Ok((stdout, stderr))) => {
                let inspect = self.client.inspect_exec(&exec.id).await?;
                Ok(ExecOutcome {
                    exit_code: inspect.exit_code.unwrap_or(0),
                    stdout,
                    stderr,
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                // Kill the runaway process by restarting the container; the
                // session (and its workspace mount) stays usable.
                warn!(
                    "Exec in container {} exceeded {:?}; restarting container",
                    container_id, timeout
                );
                if let Err(e) = self
                    .client
                    .restart_container(container_id, None::<RestartContainerOptions>)
                    .await
                {
                    warn!("Failed to restart container {}: {}", container_id, e);
                }
                Ok(ExecOutcome {
                    exit_code: -1,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    timed_out: true,
                })
            }
        }
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        debug!("Removing session container {}", container_id);

        let stop = self
            .client
            .stop_container(
                container_id,
                Some(StopContainerOptions {
                    t: STOP_TIMEOUT_SECS,
                }),
            )
            .await;
        match stop {
            Ok(()) => {}
            // Already stopped is not an error.
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => debug!("Container {} already stopped", container_id),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!("Container {} already removed", container_id);
                return Ok(());
            }
            Err(e) => return Err(SandboxError::Docker(e)),
        }

        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self.client.remove_container(container_id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(SandboxError::Docker(e)),
        }
    }
}
