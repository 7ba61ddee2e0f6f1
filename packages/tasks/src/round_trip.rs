// ABOUTME: Single round-trip task executor: publish one action, await its observation
// ABOUTME: Bounded by a fixed wait timeout; a late observation is ignored

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use switchboard_events::{Action, EventBus, Observation, OBSERVATION_KIND};
use tokio::sync::oneshot;
use tracing::debug;

use crate::task::{Task, TaskContext, TaskExecutor};
use crate::types::{TaskFailure, TaskPriority};

/// How long a round-trip waits for its matching observation by default.
pub const DEFAULT_OBSERVATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Publishes one action and waits for the observation answering it.
///
/// The observation is stored as the task result whether or not it reports
/// success - at this boundary results are data for the caller to inspect.
/// There is no retry here; retrying is the caller's responsibility.
pub struct ActionTask {
    bus: Arc<EventBus>,
    action: Action,
    timeout: Duration,
}

impl ActionTask {
    pub fn new(bus: Arc<EventBus>, action: Action) -> Self {
        Self {
            bus,
            action,
            timeout: DEFAULT_OBSERVATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn action_id(&self) -> &str {
        &self.action.id
    }

    /// Wrap this round trip in a task named after the action.
    pub fn into_task(self, priority: TaskPriority) -> Arc<Task> {
        let name = format!("await-{}", self.action.payload.name());
        let description = format!("Round trip for action {}", self.action.id);
        Task::new(name, description, priority, Box::new(self))
    }
}

#[async_trait]
impl TaskExecutor for ActionTask {
    async fn execute(&self, ctx: &TaskContext) -> Result<Value, TaskFailure> {
        let (tx, rx) = oneshot::channel::<Observation>();
        let waiter = Mutex::new(Some(tx));
        let action_id = self.action.id.clone();

        // Subscribe before publishing so the response cannot slip past us.
        let subscription = self.bus.subscribe(OBSERVATION_KIND, move |event| {
            if let Some(observation) = event.as_observation() {
                if observation.action_id == action_id {
                    if let Some(tx) = waiter.lock().expect("waiter lock poisoned").take() {
                        let _ = tx.send(observation.clone());
                    }
                }
            }
            Ok(())
        });

        self.bus.publish(self.action.clone());
        debug!(
            "task {} awaiting observation for action {}",
            ctx.task_id, self.action.id
        );

        let outcome = tokio::select! {
            observation = rx => match observation {
                Ok(observation) => serde_json::to_value(&observation)
                    .map_err(|e| TaskFailure::execution(e.to_string())),
                Err(_) => Err(TaskFailure::execution("observation channel closed")),
            },
            _ = tokio::time::sleep(self.timeout) => Err(TaskFailure::timeout(format!(
                "No observation for action {} within {:?}",
                self.action.id, self.timeout
            ))),
            _ = ctx.cancel.cancelled() => Err(TaskFailure::cancelled()),
        };

        // Stop waiting on every path; a late observation is simply ignored.
        self.bus.unsubscribe(subscription);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde_json::json;
    use switchboard_events::{ActionPayload, EventSource};

    use super::*;
    use crate::types::{FailureKind, TaskStatus};

    fn code_action() -> Action {
        Action::new(
            "agent_dev",
            ActionPayload::CodeExecution {
                code: "print(1 + 2)".to_string(),
                language: "python".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_round_trip_completes_with_observation() {
        let bus = Arc::new(EventBus::new());
        let action = code_action();
        let task = ActionTask::new(Arc::clone(&bus), action.clone())
            .with_timeout(Duration::from_secs(2))
            .into_task(TaskPriority::Medium);

        let runner = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.start().await })
        };

        // The executor answers from its own context, never from a handler.
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.publish(Observation::for_action(&action, true, json!("3")));

        runner.await.unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);

        let result = task.result().unwrap().unwrap();
        assert_eq!(result["action_id"], json!(action.id));
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["result"], json!("3"));
    }

    #[tokio::test]
    async fn test_failed_observation_is_stored_as_data() {
        let bus = Arc::new(EventBus::new());
        let action = code_action();
        let task = ActionTask::new(Arc::clone(&bus), action.clone())
            .with_timeout(Duration::from_secs(2))
            .into_task(TaskPriority::Medium);

        let runner = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.start().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.publish(Observation::for_action(&action, false, json!("exit code 1")));

        runner.await.unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result().unwrap().unwrap()["success"], json!(false));
    }

    #[tokio::test]
    async fn test_times_out_when_no_observation_arrives() {
        let bus = Arc::new(EventBus::new());
        let timeout = Duration::from_millis(100);
        let task = ActionTask::new(Arc::clone(&bus), code_action())
            .with_timeout(timeout)
            .into_task(TaskPriority::Medium);

        let started = Instant::now();
        task.start().await;
        let elapsed = started.elapsed();

        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(
            task.result().unwrap().unwrap_err().kind,
            FailureKind::Timeout
        );
        // Not earlier than the window, and not unbounded.
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout * 10);
    }

    #[tokio::test]
    async fn test_wait_stops_on_cancellation() {
        let bus = Arc::new(EventBus::new());
        let action = code_action();
        let task = ActionTask::new(Arc::clone(&bus), action.clone())
            .with_timeout(Duration::from_secs(30))
            .into_task(TaskPriority::Medium);

        let runner = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.start().await })
        };

        while task.status() != TaskStatus::Running {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        task.cancel().await;
        runner.await.unwrap();

        assert_eq!(task.status(), TaskStatus::Cancelled);

        // The eventual observation still lands on the bus but changes nothing.
        bus.publish(Observation::for_action(&action, true, json!("late")));
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert_eq!(
            task.result().unwrap().unwrap_err().kind,
            FailureKind::Cancelled
        );
    }
}
