// ABOUTME: Error types for sandbox session management
// ABOUTME: Validation failures carry fixed, stable messages

use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Unknown session ID
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Path validation failed before any filesystem access
    #[error("Path escapes session workspace")]
    InvalidPath,

    /// Operation the session's language cannot support
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Docker/container runtime errors
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Backend transport or lifecycle error
    #[error("Backend error: {0}")]
    Backend(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;
