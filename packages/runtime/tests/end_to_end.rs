// ABOUTME: End-to-end flow: observation -> developer agent -> action -> sandbox run
// ABOUTME: Full loop through the bus and scheduler with a stubbed tool-calling provider

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use switchboard_agents::AgentConfig;
use switchboard_ai::{
    ChatMessage, Completion, CompletionOptions, CompletionProvider, ProviderResult, ToolCall,
};
use switchboard_events::{ActionPayload, EventSource, Observation};
use switchboard_runtime::{Runtime, RuntimeConfig};
use switchboard_sandbox::MockBackend;
use switchboard_tasks::{ActionTask, TaskPriority, TaskStatus};

/// Stands in for the LLM: always answers with an execute_code tool call,
/// the way a real model responds to a programming request.
struct ToolCallingProvider;

#[async_trait]
impl CompletionProvider for ToolCallingProvider {
    async fn generate_chat_completion(
        &self,
        _messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> ProviderResult<Completion> {
        assert!(
            options.tools.iter().any(|t| t.name == "execute_code"),
            "developer agent must declare execute_code"
        );
        Ok(Completion {
            content: String::new(),
            tool_calls: vec![ToolCall {
                name: "execute_code".to_string(),
                arguments: json!({
                    "code": "def add(a, b):\n    return a + b\n\nprint(add(2, 3))\n",
                    "language": "python"
                }),
            }],
        })
    }

    fn name(&self) -> &str {
        "tool-calling-stub"
    }
}

async fn stub_runtime(base_dir: &std::path::Path) -> Runtime {
    Runtime::new(RuntimeConfig {
        sandbox_base_dir: base_dir.to_path_buf(),
        provider: Some(Arc::new(ToolCallingProvider)),
        sandbox_backend: Some(Arc::new(MockBackend::new())),
        ..RuntimeConfig::default()
    })
    .await
}

#[tokio::test]
async fn test_developer_observation_yields_runnable_code_action() {
    let base = tempfile::tempdir().unwrap();
    let runtime = stub_runtime(base.path()).await;

    let agent = runtime
        .create_agent("developer", AgentConfig::named("dev", "writes code"))
        .unwrap();

    let request = Observation::new(
        EventSource::User,
        "",
        true,
        json!("write a function that adds two numbers"),
    );
    let action = agent.process(&request).await.unwrap();

    let ActionPayload::CodeExecution { code, language } = &action.payload else {
        panic!("expected code_execution action, got {:?}", action.payload);
    };
    assert!(!code.is_empty());
    assert_eq!(language, "python");

    // Run the produced code in a fresh session of the matching language.
    let sandbox = runtime.sandbox();
    let session = sandbox.create_session(language.parse().unwrap()).await.unwrap();
    let output = sandbox.execute_code(&session, code, None).await.unwrap();
    assert_eq!(output.exit_code, 0);
    assert!(output.success);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_full_loop_action_to_observation_through_scheduler() {
    let base = tempfile::tempdir().unwrap();
    let runtime = stub_runtime(base.path()).await;
    let bus = runtime.bus();
    let sandbox = runtime.sandbox();

    // External consumer: forwards code_execution actions out of the handler
    // into its own context, runs them in the sandbox, and publishes the
    // matching observation.
    let (action_tx, mut action_rx) =
        tokio::sync::mpsc::unbounded_channel::<switchboard_events::Action>();
    bus.subscribe("code_execution", move |event| {
        if let Some(action) = event.as_action() {
            let _ = action_tx.send(action.clone());
        }
        Ok(())
    });

    let responder = {
        let bus = runtime.bus();
        let sandbox = Arc::clone(&sandbox);
        tokio::spawn(async move {
            if let Some(action) = action_rx.recv().await {
                let ActionPayload::CodeExecution { code, language } = &action.payload else {
                    return;
                };
                let session = sandbox
                    .create_session(language.parse().unwrap())
                    .await
                    .unwrap();
                let output = sandbox.execute_code(&session, code, None).await.unwrap();
                bus.publish(Observation::for_action(
                    &action,
                    output.success,
                    json!({"exit_code": output.exit_code, "stdout": output.stdout}),
                ));
                sandbox.close_session(&session).await.unwrap();
            }
        })
    };

    // Agent turns the user request into an action; the scheduler drives the
    // round trip against the bus.
    let agent = runtime
        .create_agent("developer", AgentConfig::named("dev", ""))
        .unwrap();
    let request = Observation::new(
        EventSource::User,
        "",
        true,
        json!("write a function that adds two numbers"),
    );
    let action = agent.process(&request).await.unwrap();

    let task = ActionTask::new(runtime.bus(), action)
        .with_timeout(Duration::from_secs(5))
        .into_task(TaskPriority::High);
    runtime.scheduler().add_task(Arc::clone(&task));

    assert_eq!(task.wait().await, TaskStatus::Completed);
    let result = task.result().unwrap().unwrap();
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["result"]["exit_code"], json!(0));

    responder.await.unwrap();
    runtime.shutdown().await;
}
