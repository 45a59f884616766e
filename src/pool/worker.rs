//! Worker thread implementation

use crate::core::{PoolError, Result, Task};
use crate::queue::TaskQueue;
use crossbeam_channel::Sender;
use log::{debug, error, warn};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// What a worker does after one of its tasks panics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanicPolicy {
    /// Report the panic and keep serving the queue
    #[default]
    Continue,
    /// Report the panic and let the worker thread exit, shrinking the pool
    TerminateWorker,
}

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total number of tasks that ran to completion
    pub tasks_completed: AtomicU64,
    /// Total number of tasks that panicked
    pub tasks_panicked: AtomicU64,
    /// Total time spent running tasks (microseconds)
    pub busy_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, completed: bool, microseconds: u64) {
        if completed {
            self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
        }
        self.busy_time_us.fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Get total tasks completed
    pub fn get_tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    /// Get total tasks panicked
    pub fn get_tasks_panicked(&self) -> u64 {
        self.tasks_panicked.load(Ordering::Relaxed)
    }

    /// Get average time per task in microseconds, counting panicked tasks
    pub fn get_average_task_time_us(&self) -> f64 {
        let total = self.busy_time_us.load(Ordering::Relaxed);
        let count = self.get_tasks_completed() + self.get_tasks_panicked();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self, worker_id: usize) -> WorkerStatSnapshot {
        WorkerStatSnapshot {
            worker_id,
            tasks_completed: self.get_tasks_completed(),
            tasks_panicked: self.get_tasks_panicked(),
            busy_time_us: self.busy_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of one worker's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatSnapshot {
    /// Worker index
    pub worker_id: usize,
    /// Tasks that ran to completion
    pub tasks_completed: u64,
    /// Tasks that panicked
    pub tasks_panicked: u64,
    /// Time spent running tasks (microseconds)
    pub busy_time_us: u64,
}

/// Settings a worker needs from the pool configuration
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Thread name prefix, the worker id is appended
    pub thread_name_prefix: String,
    /// Reaction to a panicking task
    pub panic_policy: PanicPolicy,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            thread_name_prefix: "worker".to_string(),
            panic_policy: PanicPolicy::default(),
        }
    }
}

/// Sends the worker id on drop, so the pool hears about every exit path.
struct ExitNotice {
    id: usize,
    tx: Sender<usize>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        // The pool may have stopped listening already.
        let _ = self.tx.send(self.id);
    }
}

/// A worker thread that runs tasks from the shared queue
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: thread::JoinHandle<()>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Create and start a new worker bound to `queue`
    ///
    /// # Shutdown Behavior
    ///
    /// The worker blocks on the queue while it is empty and exits once the
    /// queue is closed and drained. Its id is sent on `exit_tx` when the
    /// thread finishes, whichever way it finishes.
    pub fn spawn(
        id: usize,
        queue: Arc<TaskQueue>,
        options: &WorkerOptions,
        exit_tx: Sender<usize>,
    ) -> Result<Self> {
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);
        let panic_policy = options.panic_policy;

        let thread = thread::Builder::new()
            .name(format!("{}-{}", options.thread_name_prefix, id))
            .spawn(move || {
                let _notice = ExitNotice { id, tx: exit_tx };
                Self::run(id, &queue, &stats_clone, panic_policy);
            })
            .map_err(|e| PoolError::spawn(id, e))?;

        Ok(Self { id, thread, stats })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Identifier of the worker's OS thread
    pub fn thread_id(&self) -> thread::ThreadId {
        self.thread.thread().id()
    }

    /// Returns `true` once the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Join the worker thread
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| PoolError::join(self.id, "Worker thread panicked"))
    }

    fn run(id: usize, queue: &TaskQueue, stats: &WorkerStats, panic_policy: PanicPolicy) {
        #[cfg(feature = "tracing")]
        let worker_span = tracing::debug_span!("worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        debug!("worker {} started", id);

        while let Some(task) = queue.dequeue() {
            let completed = Self::execute_task(id, task, stats);
            if !completed && panic_policy == PanicPolicy::TerminateWorker {
                warn!("worker {} terminating after task panic", id);
                return;
            }
        }

        debug!(
            "worker {} stopping: {} tasks completed, {} panicked",
            id,
            stats.get_tasks_completed(),
            stats.get_tasks_panicked()
        );
    }

    /// Run one task behind a panic boundary. Returns `false` if it panicked.
    fn execute_task(id: usize, task: Task, stats: &WorkerStats) -> bool {
        let name = task.name().to_string();
        let start = Instant::now();

        let outcome = catch_unwind(AssertUnwindSafe(|| task.run()));

        let elapsed = start.elapsed();
        stats.record(outcome.is_ok(), elapsed.as_micros() as u64);

        match outcome {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    task = %name,
                    duration_us = elapsed.as_micros() as u64,
                    "task completed"
                );
                true
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                #[cfg(feature = "tracing")]
                tracing::error!(task = %name, panic_message = %panic_msg, "task panicked");
                error!("worker {}: task '{}' panicked: {}", id, name, panic_msg);
                false
            }
        }
    }
}
