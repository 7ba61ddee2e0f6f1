// ABOUTME: Task state machine and bounded-concurrency scheduler for switchboard
// ABOUTME: Single round-trip and multi-stage composition with cooperative cancellation

pub mod pipeline;
pub mod round_trip;
pub mod scheduler;
pub mod task;
pub mod types;

pub use pipeline::{PipelineStage, PipelineTask, StageFactory, StageResults};
pub use round_trip::{ActionTask, DEFAULT_OBSERVATION_TIMEOUT};
pub use scheduler::{TaskScheduler, DEFAULT_MAX_CONCURRENT, MAX_FINISHED_TASKS};
pub use task::{CancelToken, Task, TaskContext, TaskExecutor};
pub use types::{FailureKind, TaskFailure, TaskPriority, TaskStatus};
