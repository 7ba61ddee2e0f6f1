// ABOUTME: Session lifecycle manager: isolated workdir + container per session
// ABOUTME: Validates all inputs before side effects; teardown is best-effort

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, SandboxError};
use crate::providers::{ContainerSpec, DockerBackend, ExecutionBackend, MockBackend};
use crate::types::{ExecutionOutput, FileEntry, Language, ResourceLimits, Session};
use crate::validation::{is_valid_package_name, resolve_session_path};

/// Fixed message for rejected package names (stable, asserted by callers).
const INVALID_PACKAGE_NAME: &str = "Invalid package name";

/// Wall-clock ceiling for package installation.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

const MANAGED_LABEL: &str = "switchboard.managed";
const SESSION_LABEL: &str = "switchboard.session";

/// Creates, tracks, and tears down isolated execution sessions.
///
/// Each session exclusively owns one uniquely-named working directory and one
/// backing container; both are released together on close. No two sessions
/// share either.
pub struct SessionManager {
    backend: Arc<dyn ExecutionBackend>,
    sessions: RwLock<HashMap<String, Session>>,
    base_dir: PathBuf,
    limits: ResourceLimits,
}

impl SessionManager {
    /// Probe the container runtime and build a manager around it, degrading
    /// to the mock backend when Docker cannot be reached.
    pub async fn new(base_dir: impl Into<PathBuf>) -> Self {
        let backend: Arc<dyn ExecutionBackend> = match DockerBackend::connect().await {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                warn!(
                    "Container runtime unavailable ({}); sandbox degrades to mock backend",
                    e
                );
                Arc::new(MockBackend::new())
            }
        };
        Self::with_backend(backend, base_dir)
    }

    /// Dependency-injected constructor used by tests and embedders.
    pub fn with_backend(backend: Arc<dyn ExecutionBackend>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            sessions: RwLock::new(HashMap::new()),
            base_dir: base_dir.into(),
            limits: ResourceLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Allocate a fresh isolated working directory and an idle container.
    pub async fn create_session(&self, language: Language) -> Result<String> {
        let id = format!("sess_{}", nanoid::nanoid!(12));
        let workdir = self.base_dir.join(&id);
        fs::create_dir_all(&workdir).await?;

        let mut labels = HashMap::new();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(SESSION_LABEL.to_string(), id.clone());

        let spec = ContainerSpec {
            image: language.image().to_string(),
            name: format!("switchboard-{}", id),
            workspace_dir: workdir.clone(),
            memory_mb: self.limits.memory_mb,
            cpu_cores: self.limits.cpu_cores,
            labels,
        };

        let container_id = match self.backend.create_container(&spec).await {
            Ok(container_id) => container_id,
            Err(e) => {
                // Both resources are released together or not at all.
                if let Err(cleanup) = fs::remove_dir_all(&workdir).await {
                    warn!("Failed to remove workdir for {}: {}", id, cleanup);
                }
                return Err(e);
            }
        };

        let session = Session {
            id: id.clone(),
            language,
            workdir,
            container_id,
            created_at: Utc::now(),
        };
        self.sessions.write().await.insert(id.clone(), session);

        info!("Created {} session {}", language, id);
        Ok(id)
    }

    /// Write the code into the session workspace and run its interpreter
    /// against it inside the container, bounded by a wall-clock timeout.
    pub async fn execute_code(
        &self,
        session_id: &str,
        code: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecutionOutput> {
        let session = self.require_session(session_id).await?;

        let filename = format!(
            "snippet_{}.{}",
            nanoid::nanoid!(8),
            session.language.extension()
        );
        fs::write(session.workdir.join(&filename), code).await?;

        let command = vec![
            session.language.interpreter().to_string(),
            format!("/workspace/{}", filename),
        ];
        let timeout = timeout.unwrap_or(Duration::from_secs(self.limits.timeout_seconds));

        Ok(self.run(&session, command, timeout).await)
    }

    /// Install a package with the session language's package manager. The
    /// name is validated against a strict allow-pattern before any process
    /// is invoked.
    pub async fn install_package(
        &self,
        session_id: &str,
        package: &str,
    ) -> Result<ExecutionOutput> {
        let session = self.require_session(session_id).await?;

        if !is_valid_package_name(package) {
            warn!(
                "Rejected package name {:?} for session {}",
                package, session_id
            );
            return Ok(ExecutionOutput::rejected(INVALID_PACKAGE_NAME));
        }

        let Some(command) = session.language.install_argv(package) else {
            return Ok(ExecutionOutput::rejected(format!(
                "Package installation is not supported for {} sessions",
                session.language
            )));
        };

        Ok(self.run(&session, command, INSTALL_TIMEOUT).await)
    }

    /// Write a file under the session workspace. Paths are confined: `..`
    /// and absolute paths are rejected before touching the filesystem.
    pub async fn upload_file(
        &self,
        session_id: &str,
        relative_path: &str,
        content: &str,
    ) -> Result<()> {
        let session = self.require_session(session_id).await?;
        let path = resolve_session_path(&session.workdir, relative_path)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        Ok(())
    }

    pub async fn read_file(&self, session_id: &str, relative_path: &str) -> Result<String> {
        let session = self.require_session(session_id).await?;
        let path = resolve_session_path(&session.workdir, relative_path)?;
        Ok(fs::read_to_string(path).await?)
    }

    pub async fn list_files(
        &self,
        session_id: &str,
        relative_dir: &str,
    ) -> Result<Vec<FileEntry>> {
        let session = self.require_session(session_id).await?;
        let dir = resolve_session_path(&session.workdir, relative_dir)?;

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                size_bytes: metadata.len(),
                is_dir: metadata.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Release the session's container and directory together. Cleanup is
    /// best-effort: resource release failures are logged and swallowed.
    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SandboxError::NotFound(session_id.to_string()))?;

        if let Err(e) = self.backend.remove_container(&session.container_id).await {
            warn!(
                "Failed to remove container {} for session {}: {}",
                session.container_id, session.id, e
            );
        }
        if let Err(e) = fs::remove_dir_all(&session.workdir).await {
            warn!(
                "Failed to remove workdir {} for session {}: {}",
                session.workdir.display(),
                session.id,
                e
            );
        }

        info!("Closed session {}", session.id);
        Ok(())
    }

    /// Close every open session. Shutdown path; never errors.
    pub async fn cleanup(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.close_session(&id).await {
                warn!("Cleanup failed for session {}: {}", id, e);
            }
        }
        info!("Session manager cleanup complete");
    }

    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn list_sessions(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }

    async fn require_session(&self, session_id: &str) -> Result<Session> {
        self.session(session_id)
            .await
            .ok_or_else(|| SandboxError::NotFound(session_id.to_string()))
    }

    /// Run a command in the session container, folding timeouts and backend
    /// transport errors into the output rather than raising them.
    async fn run(&self, session: &Session, command: Vec<String>, timeout: Duration) -> ExecutionOutput {
        let started = Instant::now();
        let outcome = self
            .backend
            .exec(&session.container_id, command, timeout)
            .await;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(outcome) if outcome.timed_out => ExecutionOutput {
                success: false,
                stdout: String::from_utf8_lossy(&outcome.stdout).to_string(),
                stderr: format!("Execution timed out after {}s", timeout.as_secs()),
                exit_code: outcome.exit_code,
                execution_time_ms,
            },
            Ok(outcome) => ExecutionOutput {
                success: outcome.exit_code == 0,
                stdout: String::from_utf8_lossy(&outcome.stdout).to_string(),
                stderr: String::from_utf8_lossy(&outcome.stderr).to_string(),
                exit_code: outcome.exit_code,
                execution_time_ms,
            },
            Err(e) => ExecutionOutput {
                success: false,
                stdout: String::new(),
                stderr: e.to_string(),
                exit_code: -1,
                execution_time_ms,
            },
        }
    }
}
