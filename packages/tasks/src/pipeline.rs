// ABOUTME: Multi-stage task executor: ordered stages, each built from prior results
// ABOUTME: Strictly sequential; first failing stage halts the pipeline, no rollback

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::task::{Task, TaskContext, TaskExecutor};
use crate::types::{TaskFailure, TaskStatus};

type BoxedTaskFuture = Pin<Box<dyn Future<Output = Result<Arc<Task>, TaskFailure>> + Send>>;

/// Async factory building a stage's inner task from the accumulated results
/// of all prior stages. The stage's agent lives inside the closure.
pub type StageFactory = Box<dyn Fn(Vec<Value>) -> BoxedTaskFuture + Send + Sync>;

/// One named stage of a pipeline.
pub struct PipelineStage {
    pub name: String,
    build: StageFactory,
}

impl PipelineStage {
    pub fn new<F, Fut>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<Task>, TaskFailure>> + Send + 'static,
    {
        Self {
            name: name.into(),
            build: Box::new(move |results| Box::pin(build(results))),
        }
    }
}

/// Shared view of the accumulated stage results, readable mid-flight and
/// preserved when a stage fails.
#[derive(Clone, Default)]
pub struct StageResults(Arc<Mutex<Vec<Value>>>);

impl StageResults {
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.lock().expect("stage results lock poisoned").clone()
    }

    fn push(&self, value: Value) {
        self.0
            .lock()
            .expect("stage results lock poisoned")
            .push(value);
    }
}

/// Executes stages strictly sequentially. Each stage's inner task is started
/// by this executor directly, never handed to the scheduler. A failed stage
/// stops the pipeline immediately with the partial results kept; completed
/// stages are not rolled back.
pub struct PipelineTask {
    stages: Vec<PipelineStage>,
    results: StageResults,
    children: Mutex<Vec<Arc<Task>>>,
}

impl PipelineTask {
    pub fn new(stages: Vec<PipelineStage>) -> Self {
        Self {
            stages,
            results: StageResults::default(),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Handle to the accumulated stage results; stays valid after the
    /// executor is boxed into a task.
    pub fn results_handle(&self) -> StageResults {
        self.results.clone()
    }

    /// Inner tasks spawned so far, newest last. The pipeline owns them; their
    /// lifetime never exceeds the enclosing task's.
    pub fn children(&self) -> Vec<Arc<Task>> {
        self.children
            .lock()
            .expect("pipeline children lock poisoned")
            .clone()
    }
}

#[async_trait]
impl TaskExecutor for PipelineTask {
    async fn execute(&self, ctx: &TaskContext) -> Result<Value, TaskFailure> {
        for (index, stage) in self.stages.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                return Err(TaskFailure::cancelled());
            }

            let prior = self.results.snapshot();
            let inner = (stage.build)(prior).await.map_err(|failure| {
                TaskFailure::execution(format!(
                    "stage '{}' setup failed: {}",
                    stage.name, failure.message
                ))
            })?;

            debug!(
                "pipeline {} running stage {}/{} '{}' as task {}",
                ctx.task_id,
                index + 1,
                self.stages.len(),
                stage.name,
                inner.id()
            );
            self.children
                .lock()
                .expect("pipeline children lock poisoned")
                .push(Arc::clone(&inner));

            tokio::select! {
                _ = inner.start() => {}
                _ = ctx.cancel.cancelled() => {
                    inner.cancel().await;
                    return Err(TaskFailure::cancelled());
                }
            }

            match inner.status() {
                TaskStatus::Completed => {
                    let value = inner
                        .result()
                        .and_then(|r| r.ok())
                        .unwrap_or(Value::Null);
                    self.results.push(value);
                }
                TaskStatus::Cancelled => return Err(TaskFailure::cancelled()),
                _ => {
                    let message = inner
                        .result()
                        .and_then(|r| r.err())
                        .map(|f| f.message)
                        .unwrap_or_else(|| "unknown failure".to_string());
                    return Err(TaskFailure::execution(format!(
                        "stage '{}' failed after {} completed stage(s): {}",
                        stage.name,
                        self.results.snapshot().len(),
                        message
                    )));
                }
            }
        }

        Ok(Value::Array(self.results.snapshot()))
    }
}
