// ABOUTME: Sandboxed code-execution session manager for switchboard
// ABOUTME: One isolated workdir + container per session, mock fallback included

pub mod error;
pub mod manager;
pub mod providers;
pub mod types;
pub mod validation;

pub use error::{Result, SandboxError};
pub use manager::SessionManager;
pub use providers::{ContainerSpec, DockerBackend, ExecOutcome, ExecutionBackend, MockBackend};
pub use types::{ExecutionOutput, FileEntry, Language, ResourceLimits, Session};
