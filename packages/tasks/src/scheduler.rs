// ABOUTME: Bounded-concurrency task scheduler with priority admission
// ABOUTME: FIFO within a priority band; completion callbacks reuse freed capacity

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::task::Task;
use crate::types::{TaskPriority, TaskStatus};

/// Finished tasks retained for inspection; older ones are evicted.
pub const MAX_FINISHED_TASKS: usize = 100;

/// Default concurrency cap.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

struct PendingEntry {
    id: String,
    seq: u64,
}

struct SchedulerState {
    tasks: HashMap<String, Arc<Task>>,
    pending: Vec<PendingEntry>,
    running: HashSet<String>,
    finished: VecDeque<String>,
    max_concurrent: usize,
    next_seq: u64,
}

/// Admits tasks under a concurrency cap, ordered by priority with FIFO
/// tie-break inside a band (the earliest-added of equal priority goes first).
///
/// Cheap-clone handle; all bookkeeping mutations happen under one internal
/// lock, entered either from the public API or from a finished task's
/// completion callback - the single-writer discipline for scheduler state.
#[derive(Clone)]
pub struct TaskScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl TaskScheduler {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                tasks: HashMap::new(),
                pending: Vec::new(),
                running: HashSet::new(),
                finished: VecDeque::new(),
                max_concurrent: max_concurrent.max(1),
                next_seq: 0,
            })),
        }
    }

    /// Register a task and trigger a scheduling pass. Returns the task id.
    pub fn add_task(&self, task: Arc<Task>) -> String {
        let id = task.id().to_string();
        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            let seq = state.next_seq;
            state.next_seq += 1;
            state.tasks.insert(id.clone(), task);
            state.pending.push(PendingEntry {
                id: id.clone(),
                seq,
            });
        }
        debug!("task {} added to scheduler", id);
        self.schedule();
        id
    }

    /// Forward a cancel to the task, free its slot, and re-schedule.
    pub async fn cancel_task(&self, id: &str) -> bool {
        let task = {
            let state = self.state.lock().expect("scheduler lock poisoned");
            state.tasks.get(id).cloned()
        };
        let Some(task) = task else {
            return false;
        };

        task.cancel().await;

        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            state.running.remove(id);
            state.pending.retain(|entry| entry.id != id);
            if !state.finished.iter().any(|f| f == id) {
                state.finished.push_back(id.to_string());
                Self::trim_finished(&mut state);
            }
        }
        info!("task {} cancelled via scheduler", id);
        self.schedule();
        true
    }

    /// Update the cap. Takes effect on the next scheduling pass; already
    /// running tasks are never preempted when the cap shrinks.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            state.max_concurrent = max_concurrent.max(1);
        }
        self.schedule();
    }

    /// Cancel every live task, then drop all scheduler state.
    pub async fn clear_tasks(&self) {
        let tasks: Vec<Arc<Task>> = {
            let state = self.state.lock().expect("scheduler lock poisoned");
            state.tasks.values().cloned().collect()
        };
        for task in tasks {
            if !task.status().is_terminal() {
                task.cancel().await;
            }
        }

        let mut state = self.state.lock().expect("scheduler lock poisoned");
        state.tasks.clear();
        state.pending.clear();
        state.running.clear();
        state.finished.clear();
        info!("scheduler cleared");
    }

    pub fn get_task(&self, id: &str) -> Option<Arc<Task>> {
        self.state
            .lock()
            .expect("scheduler lock poisoned")
            .tasks
            .get(id)
            .cloned()
    }

    pub fn list_tasks(&self) -> Vec<Arc<Task>> {
        self.state
            .lock()
            .expect("scheduler lock poisoned")
            .tasks
            .values()
            .cloned()
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.state
            .lock()
            .expect("scheduler lock poisoned")
            .running
            .len()
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .expect("scheduler lock poisoned")
            .pending
            .len()
    }

    /// One scheduling pass: admit pending tasks by (priority rank, insertion
    /// order) until the pool is empty or the cap is reached.
    fn schedule(&self) {
        loop {
            let admitted = {
                let mut state = self.state.lock().expect("scheduler lock poisoned");

                // Entries cancelled while queued never get admitted.
                let SchedulerState { tasks, pending, .. } = &mut *state;
                pending.retain(|entry| {
                    tasks
                        .get(&entry.id)
                        .map(|t| t.status() == TaskStatus::Pending)
                        .unwrap_or(false)
                });

                if state.running.len() >= state.max_concurrent {
                    None
                } else {
                    let best = state
                        .pending
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, entry)| {
                            let rank = state
                                .tasks
                                .get(&entry.id)
                                .map(|t| t.priority().rank())
                                .unwrap_or(TaskPriority::Low.rank());
                            (rank, entry.seq)
                        })
                        .map(|(index, _)| index);

                    best.map(|index| {
                        let entry = state.pending.remove(index);
                        state.running.insert(entry.id.clone());
                        state
                            .tasks
                            .get(&entry.id)
                            .cloned()
                            .expect("pending entry without task")
                    })
                }
            };

            let Some(task) = admitted else { break };

            debug!(
                "admitting task {} (priority {:?})",
                task.id(),
                task.priority()
            );
            let scheduler = self.clone();
            tokio::spawn(async move {
                task.start().await;
                scheduler.on_task_finished(task.id());
            });
        }
    }

    fn on_task_finished(&self, id: &str) {
        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            if state.running.remove(id) {
                state.finished.push_back(id.to_string());
                Self::trim_finished(&mut state);
            }
        }
        debug!("task {} finished; re-running scheduling pass", id);
        self.schedule();
    }

    fn trim_finished(state: &mut SchedulerState) {
        while state.finished.len() > MAX_FINISHED_TASKS {
            if let Some(evicted) = state.finished.pop_front() {
                state.tasks.remove(&evicted);
            }
        }
    }
}
