// ABOUTME: Docker-backed session tests exercising real container isolation
// ABOUTME: All ignored by default; they require a Docker daemon and pulled images

use std::sync::Arc;
use std::time::Duration;

use switchboard_sandbox::{DockerBackend, Language, SessionManager};

async fn docker_manager(base: &tempfile::TempDir) -> SessionManager {
    let backend = DockerBackend::connect()
        .await
        .expect("Docker daemon required for this test");
    SessionManager::with_backend(Arc::new(backend), base.path())
}

#[tokio::test]
#[ignore] // Requires Docker daemon and a local python:3.12-slim image
async fn test_python_execution_roundtrip() {
    let base = tempfile::tempdir().unwrap();
    let manager = docker_manager(&base).await;

    let id = manager.create_session(Language::Python).await.unwrap();
    let output = manager
        .execute_code(&id, "print(1 + 2)", Some(Duration::from_secs(30)))
        .await
        .unwrap();

    assert!(output.success, "stderr: {}", output.stderr);
    assert_eq!(output.exit_code, 0);
    assert_eq!(output.stdout.trim(), "3");

    manager.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Docker daemon
async fn test_nonzero_exit_is_data_not_error() {
    let base = tempfile::tempdir().unwrap();
    let manager = docker_manager(&base).await;

    let id = manager.create_session(Language::Python).await.unwrap();
    let output = manager
        .execute_code(&id, "import sys; sys.exit(3)", Some(Duration::from_secs(30)))
        .await
        .unwrap();

    assert!(!output.success);
    assert_eq!(output.exit_code, 3);

    manager.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Docker daemon
async fn test_execution_timeout_kills_runaway_process() {
    let base = tempfile::tempdir().unwrap();
    let manager = docker_manager(&base).await;

    let id = manager.create_session(Language::Python).await.unwrap();
    let output = manager
        .execute_code(
            &id,
            "import time\nwhile True:\n    time.sleep(1)\n",
            Some(Duration::from_secs(2)),
        )
        .await
        .unwrap();

    assert!(!output.success);
    assert!(output.stderr.contains("timed out"));

    // The session container survives the restart and stays usable.
    let after = manager
        .execute_code(&id, "print('alive')", Some(Duration::from_secs(30)))
        .await
        .unwrap();
    assert!(after.success);

    manager.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires Docker daemon
async fn test_container_has_no_network() {
    let base = tempfile::tempdir().unwrap();
    let manager = docker_manager(&base).await;

    let id = manager.create_session(Language::Python).await.unwrap();
    let output = manager
        .execute_code(
            &id,
            "import socket\nsocket.create_connection((\"1.1.1.1\", 80), timeout=3)\n",
            Some(Duration::from_secs(15)),
        )
        .await
        .unwrap();

    assert!(!output.success, "network should be unreachable");

    manager.cleanup().await;
}
