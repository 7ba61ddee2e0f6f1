// ABOUTME: Task state machine with cooperative cancellation and a result slot
// ABOUTME: Executors plug in behind a trait; status transitions are monotonic

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::types::{FailureKind, TaskFailure, TaskPriority, TaskStatus};

/// Explicit cooperative cancellation token, checked at suspension points.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without a cancel request; nothing will ever fire.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Handed to executors: identity plus the cancellation token.
pub struct TaskContext {
    pub task_id: String,
    pub cancel: CancelToken,
}

/// The body of a task. Failures are returned as values; the task records them
/// in its result slot.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, ctx: &TaskContext) -> Result<Value, TaskFailure>;
}

/// A schedulable unit of asynchronous work.
pub struct Task {
    id: String,
    name: String,
    description: String,
    priority: TaskPriority,
    created_at: DateTime<Utc>,
    status_tx: watch::Sender<TaskStatus>,
    cancel_tx: watch::Sender<bool>,
    result: Mutex<Option<Result<Value, TaskFailure>>>,
    subtasks: Mutex<Vec<Arc<Task>>>,
    executor: Box<dyn TaskExecutor>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: TaskPriority,
        executor: Box<dyn TaskExecutor>,
    ) -> Arc<Self> {
        let (status_tx, _) = watch::channel(TaskStatus::Pending);
        let (cancel_tx, _) = watch::channel(false);

        Arc::new(Self {
            id: format!("task_{}", nanoid::nanoid!(12)),
            name: name.into(),
            description: description.into(),
            priority,
            created_at: Utc::now(),
            status_tx,
            cancel_tx,
            result: Mutex::new(None),
            subtasks: Mutex::new(Vec::new()),
            executor,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> TaskStatus {
        *self.status_tx.borrow()
    }

    /// Clone of the result slot; None until the task reaches a terminal state.
    pub fn result(&self) -> Option<Result<Value, TaskFailure>> {
        self.result.lock().expect("task result lock poisoned").clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            rx: self.cancel_tx.subscribe(),
        }
    }

    /// Record ownership of a child task. Never schedules it; the parent's
    /// executor decides when (and whether) to start it.
    pub fn add_subtask(&self, task: Arc<Task>) {
        self.subtasks
            .lock()
            .expect("subtask lock poisoned")
            .push(task);
    }

    pub fn subtasks(&self) -> Vec<Arc<Task>> {
        self.subtasks
            .lock()
            .expect("subtask lock poisoned")
            .clone()
    }

    /// Run the task to a terminal state. Idempotent: a no-op unless the task
    /// is still pending.
    pub async fn start(&self) {
        let admitted = self.status_tx.send_if_modified(|status| {
            if *status == TaskStatus::Pending {
                *status = TaskStatus::Running;
                true
            } else {
                false
            }
        });
        if !admitted {
            debug!("task {} start ignored in state {:?}", self.id, self.status());
            return;
        }

        let ctx = TaskContext {
            task_id: self.id.clone(),
            cancel: self.cancel_token(),
        };
        let cancel = self.cancel_token();

        let outcome = tokio::select! {
            outcome = self.executor.execute(&ctx) => outcome,
            _ = cancel.cancelled() => Err(TaskFailure::cancelled()),
        };

        self.finish(outcome);
    }

    /// Request cancellation. Pending tasks are cancelled outright; running
    /// tasks flip to cancelled and their work is asked to stop via the token
    /// (cooperative - it is not guaranteed to stop instantly).
    pub async fn cancel(&self) {
        let mut previous = None;
        self.status_tx.send_if_modified(|status| {
            if status.is_terminal() {
                false
            } else {
                previous = Some(*status);
                *status = TaskStatus::Cancelled;
                true
            }
        });

        let Some(previous) = previous else { return };
        debug!("task {} cancelled from {:?}", self.id, previous);
        let _ = self.cancel_tx.send(true);

        if previous == TaskStatus::Pending {
            let mut result = self.result.lock().expect("task result lock poisoned");
            if result.is_none() {
                *result = Some(Err(TaskFailure::cancelled()));
            }
        }
    }

    /// Await a terminal status.
    pub async fn wait(&self) -> TaskStatus {
        let mut rx = self.status_tx.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if status.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return self.status();
            }
        }
    }

    fn finish(&self, outcome: Result<Value, TaskFailure>) {
        self.status_tx.send_if_modified(|status| {
            if *status == TaskStatus::Running {
                *status = match &outcome {
                    Ok(_) => TaskStatus::Completed,
                    Err(failure) if failure.kind == FailureKind::Cancelled => TaskStatus::Cancelled,
                    Err(_) => TaskStatus::Failed,
                };
                true
            } else {
                // An external cancel already claimed the terminal state.
                false
            }
        });

        let final_status = self.status();
        let stored = if final_status == TaskStatus::Cancelled {
            Err(TaskFailure::cancelled())
        } else {
            outcome
        };

        let mut result = self.result.lock().expect("task result lock poisoned");
        if result.is_none() {
            *result = Some(stored);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;

    struct ImmediateExecutor {
        outcome: Result<Value, TaskFailure>,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TaskExecutor for ImmediateExecutor {
        async fn execute(&self, _ctx: &TaskContext) -> Result<Value, TaskFailure> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    struct GateExecutor {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl TaskExecutor for GateExecutor {
        async fn execute(&self, ctx: &TaskContext) -> Result<Value, TaskFailure> {
            tokio::select! {
                _ = self.gate.notified() => Ok(json!("released")),
                _ = ctx.cancel.cancelled() => Err(TaskFailure::cancelled()),
            }
        }
    }

    #[tokio::test]
    async fn test_successful_run_records_result() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = Task::new(
            "ok",
            "completes immediately",
            TaskPriority::Medium,
            Box::new(ImmediateExecutor {
                outcome: Ok(json!(42)),
                runs: Arc::clone(&runs),
            }),
        );

        assert_eq!(task.status(), TaskStatus::Pending);
        task.start().await;

        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result().unwrap().unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = Task::new(
            "once",
            "",
            TaskPriority::Medium,
            Box::new(ImmediateExecutor {
                outcome: Ok(Value::Null),
                runs: Arc::clone(&runs),
            }),
        );

        task.start().await;
        task.start().await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_data_not_panic() {
        let task = Task::new(
            "fails",
            "",
            TaskPriority::Medium,
            Box::new(ImmediateExecutor {
                outcome: Err(TaskFailure::execution("exit code 1")),
                runs: Arc::new(AtomicUsize::new(0)),
            }),
        );

        task.start().await;

        assert_eq!(task.status(), TaskStatus::Failed);
        let failure = task.result().unwrap().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Execution);
        assert_eq!(failure.message, "exit code 1");
    }

    #[tokio::test]
    async fn test_cancel_pending_task() {
        let task = Task::new(
            "never-started",
            "",
            TaskPriority::Low,
            Box::new(ImmediateExecutor {
                outcome: Ok(Value::Null),
                runs: Arc::new(AtomicUsize::new(0)),
            }),
        );

        task.cancel().await;
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert_eq!(
            task.result().unwrap().unwrap_err().kind,
            FailureKind::Cancelled
        );

        // A later start must stay a no-op.
        task.start().await;
        assert_eq!(task.status(), TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_running_task_is_cooperative() {
        let gate = Arc::new(Notify::new());
        let task = Task::new(
            "blocked",
            "",
            TaskPriority::High,
            Box::new(GateExecutor {
                gate: Arc::clone(&gate),
            }),
        );

        let runner = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.start().await })
        };

        // Wait for the executor to be admitted.
        while task.status() != TaskStatus::Running {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        task.cancel().await;
        runner.await.unwrap();

        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert_eq!(
            task.result().unwrap().unwrap_err().kind,
            FailureKind::Cancelled
        );
    }

    #[tokio::test]
    async fn test_wait_resolves_on_terminal_status() {
        let gate = Arc::new(Notify::new());
        let task = Task::new(
            "waited",
            "",
            TaskPriority::Medium,
            Box::new(GateExecutor {
                gate: Arc::clone(&gate),
            }),
        );

        let waiter = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.wait().await })
        };
        let runner = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.start().await })
        };

        gate.notify_one();
        runner.await.unwrap();
        assert_eq!(waiter.await.unwrap(), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_subtask_ownership_does_not_schedule() {
        let parent = Task::new(
            "parent",
            "",
            TaskPriority::Medium,
            Box::new(ImmediateExecutor {
                outcome: Ok(Value::Null),
                runs: Arc::new(AtomicUsize::new(0)),
            }),
        );
        let child = Task::new(
            "child",
            "",
            TaskPriority::Medium,
            Box::new(ImmediateExecutor {
                outcome: Ok(Value::Null),
                runs: Arc::new(AtomicUsize::new(0)),
            }),
        );

        parent.add_subtask(Arc::clone(&child));
        assert_eq!(parent.subtasks().len(), 1);
        assert_eq!(child.status(), TaskStatus::Pending);
    }
}
