// ABOUTME: Core type definitions for sandbox sessions
// ABOUTME: Languages, resource limits, and execution results

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interpreter a session is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Shell,
}

impl Language {
    pub fn interpreter(&self) -> &'static str {
        match self {
            Language::Python => "python3",
            Language::Javascript => "node",
            Language::Shell => "bash",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Javascript => "js",
            Language::Shell => "sh",
        }
    }

    /// Container image backing sessions of this language.
    pub fn image(&self) -> &'static str {
        match self {
            Language::Python => "python:3.12-slim",
            Language::Javascript => "node:22-slim",
            Language::Shell => "debian:bookworm-slim",
        }
    }

    /// Package-manager argv for installing `package`, if the language has one.
    pub fn install_argv(&self, package: &str) -> Option<Vec<String>> {
        match self {
            Language::Python => Some(vec![
                "pip".to_string(),
                "install".to_string(),
                package.to_string(),
            ]),
            Language::Javascript => Some(vec![
                "npm".to_string(),
                "install".to_string(),
                package.to_string(),
            ]),
            Language::Shell => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Shell => "shell",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "javascript" | "node" | "js" => Ok(Language::Javascript),
            "shell" | "bash" | "sh" => Ok(Language::Shell),
            other => Err(format!("Unknown language: {}", other)),
        }
    }
}

/// Resource ceilings applied to every session container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in megabytes
    pub memory_mb: u64,
    /// CPU cores (can be fractional, e.g., 0.5 for half a core)
    pub cpu_cores: f64,
    /// Default wall-clock execution timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: 512,
            cpu_cores: 0.5,
            timeout_seconds: 30,
        }
    }
}

/// Result of running code or installing a package inside a session.
///
/// Execution failures are data at this boundary: non-zero exit codes,
/// timeouts, and backend transport errors all land here as `success: false`
/// rather than being raised to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub execution_time_ms: u64,
}

impl ExecutionOutput {
    /// Structured rejection produced before any process is invoked.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: message.into(),
            exit_code: -1,
            execution_time_ms: 0,
        }
    }
}

/// One entry from a session directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size_bytes: u64,
    pub is_dir: bool,
}

/// A live session: one owned workdir plus one owned container.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub language: Language,
    pub workdir: PathBuf,
    pub container_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing_aliases() {
        assert_eq!("node".parse::<Language>().unwrap(), Language::Javascript);
        assert_eq!("Python3".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("bash".parse::<Language>().unwrap(), Language::Shell);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn test_shell_has_no_package_manager() {
        assert!(Language::Shell.install_argv("curl").is_none());
        assert_eq!(
            Language::Python.install_argv("requests").unwrap(),
            vec!["pip", "install", "requests"]
        );
    }
}
