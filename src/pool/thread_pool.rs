//! Thread pool implementation

use crate::core::{PoolError, Result, Task};
use crate::pool::worker::{PanicPolicy, Worker, WorkerOptions, WorkerStatSnapshot, WorkerStats};
use crate::queue::TaskQueue;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Configuration for a thread pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads, fixed for the lifetime of the pool
    pub num_workers: usize,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Reaction to a panicking task
    pub panic_policy: PanicPolicy,
    /// How long dropping a still-running pool waits for its workers.
    /// Default: 5s
    pub join_timeout: Duration,
}

impl PoolConfig {
    /// Create a new configuration with the specified number of workers
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            thread_name_prefix: "worker".to_string(),
            panic_policy: PanicPolicy::default(),
            join_timeout: Duration::from_secs(5),
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set what workers do after a task panics.
    ///
    /// [`PanicPolicy::Continue`] keeps the pool at full strength.
    /// [`PanicPolicy::TerminateWorker`] retires the worker that ran the
    /// panicking task; the pool does not replace it.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }

    /// Set the bound used when a running pool is dropped
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(PoolError::invalid_config(
                "num_workers",
                "Number of workers must be greater than 0",
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(PoolError::invalid_config(
                "thread_name_prefix",
                "Thread name prefix must not be empty",
            ));
        }
        Ok(())
    }

    fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            thread_name_prefix: self.thread_name_prefix.clone(),
            panic_policy: self.panic_policy,
        }
    }
}

/// Lifecycle of a pool. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PoolState {
    /// Accepting and running tasks
    Running = 0,
    /// Queue closed, workers finishing what is left
    Draining = 1,
    /// Every worker has been joined
    Stopped = 2,
}

impl PoolState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PoolState::Running,
            1 => PoolState::Draining,
            _ => PoolState::Stopped,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolState::Running => "running",
            PoolState::Draining => "draining",
            PoolState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Serializable snapshot of pool-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pool state at snapshot time
    pub state: PoolState,
    /// Configured number of workers
    pub num_workers: usize,
    /// Workers whose thread has not exited
    pub live_workers: usize,
    /// Tasks waiting in the queue
    pub pending_tasks: usize,
    /// Tasks accepted by `submit`
    pub total_submitted: u64,
    /// Tasks that ran to completion
    pub total_completed: u64,
    /// Tasks that panicked
    pub total_panicked: u64,
    /// Per-worker counters, in worker id order
    pub workers: Vec<WorkerStatSnapshot>,
}

/// A fixed-size pool of worker threads fed from one FIFO queue
///
/// Workers are spawned by the constructor and run until [`join`](Self::join)
/// (or [`join_timeout`](Self::join_timeout), or drop) closes the queue. A
/// closed queue is drained before the workers exit, so every task accepted
/// by [`submit`](Self::submit) runs exactly once.
pub struct ThreadPool {
    config: PoolConfig,
    queue: Arc<TaskQueue>,
    workers: Mutex<Vec<Worker>>,
    worker_stats: Vec<Arc<WorkerStats>>,
    worker_threads: Vec<ThreadId>,
    state: AtomicU8,
    join_lock: Mutex<()>,
    exit_rx: Receiver<usize>,
    exited: AtomicUsize,
    total_submitted: AtomicU64,
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("pending_tasks", &self.queue.len())
            .field(
                "total_submitted",
                &self.total_submitted.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl ThreadPool {
    /// Create a pool of `size` workers.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if `size` is zero; nothing is spawned
    /// - `PoolError::Spawn` if a worker thread cannot be started; workers
    ///   spawned before the failure are stopped and joined first
    pub fn new(size: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(size))
    }

    /// Create a pool with custom configuration
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let queue = Arc::new(TaskQueue::new());
        let (exit_tx, exit_rx) = crossbeam_channel::unbounded();
        let options = config.worker_options();

        let mut workers = Vec::with_capacity(config.num_workers);
        for id in 0..config.num_workers {
            match Worker::spawn(id, Arc::clone(&queue), &options, exit_tx.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    queue.close();
                    for worker in workers {
                        let worker_id = worker.id();
                        if let Err(join_err) = worker.join() {
                            warn!(
                                "worker {} failed to join during spawn rollback: {}",
                                worker_id, join_err
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }

        let worker_stats = workers.iter().map(Worker::stats).collect();
        let worker_threads = workers.iter().map(Worker::thread_id).collect();
        debug!(
            "thread pool '{}' started with {} workers",
            config.thread_name_prefix, config.num_workers
        );

        Ok(Self {
            config,
            queue,
            workers: Mutex::new(workers),
            worker_stats,
            worker_threads,
            state: AtomicU8::new(PoolState::Running as u8),
            join_lock: Mutex::new(()),
            exit_rx,
            exited: AtomicUsize::new(0),
            total_submitted: AtomicU64::new(0),
        })
    }

    /// Submit a closure for execution.
    ///
    /// Returns as soon as the task is queued; it does not wait for the task to run.
    ///
    /// # Errors
    ///
    /// `PoolError::ShuttingDown` once a join has started.
    pub fn submit<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_task(Task::new(f))
    }

    /// Submit a prepared [`Task`], e.g. one carrying a diagnostic name
    pub fn submit_task(&self, task: Task) -> Result<()> {
        let state = self.state();
        if state != PoolState::Running {
            return Err(PoolError::shutting_down(state));
        }

        self.queue
            .enqueue(task)
            .map_err(|_| PoolError::shutting_down(self.state()))?;

        self.total_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop accepting tasks, let the workers drain the queue, and join them
    /// in construction order.
    ///
    /// Calling `join` on a stopped pool returns `Ok(())` immediately.
    ///
    /// # Errors
    ///
    /// `PoolError::Join` if a worker thread itself panicked, or if called
    /// from a task running on this pool. Task panics are contained by the
    /// worker and do not surface here.
    pub fn join(&self) -> Result<()> {
        self.reject_worker_caller()?;
        let _guard = self.join_lock.lock();
        if self.state() == PoolState::Stopped {
            return Ok(());
        }

        self.begin_draining();
        self.join_workers()
    }

    /// Like [`join`](Self::join), but gives up after `timeout`.
    ///
    /// On timeout the pool stays in the draining state with its remaining
    /// workers still owned; a later `join` or `join_timeout` picks up where
    /// this one stopped.
    ///
    /// # Errors
    ///
    /// - `PoolError::JoinTimeout` if some workers were still running at the deadline
    /// - `PoolError::Join` if a worker thread itself panicked, or if called
    ///   from a task running on this pool
    pub fn join_timeout(&self, timeout: Duration) -> Result<()> {
        self.reject_worker_caller()?;
        let _guard = self.join_lock.lock();
        if self.state() == PoolState::Stopped {
            return Ok(());
        }

        self.begin_draining();

        // A deadline past the end of `Instant` means wait without bound.
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => return self.join_workers(),
        };
        while self.exited.load(Ordering::Acquire) < self.config.num_workers {
            match self.exit_rx.recv_deadline(deadline) {
                Ok(id) => {
                    debug!("worker {} exited", id);
                    self.exited.fetch_add(1, Ordering::AcqRel);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let remaining = self.config.num_workers - self.exited.load(Ordering::Acquire);
                    return Err(PoolError::join_timeout(
                        remaining,
                        timeout.as_millis() as u64,
                    ));
                }
                // Every worker has exited and every notice was consumed.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.join_workers()
    }

    /// A worker cannot wait for itself to exit.
    fn reject_worker_caller(&self) -> Result<()> {
        let current = thread::current().id();
        match self.worker_threads.iter().position(|&id| id == current) {
            Some(worker_id) => Err(PoolError::join(
                worker_id,
                "cannot join the pool from one of its own workers",
            )),
            None => Ok(()),
        }
    }

    fn begin_draining(&self) {
        if self
            .state
            .compare_exchange(
                PoolState::Running as u8,
                PoolState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            debug!(
                "thread pool '{}' draining {} pending tasks",
                self.config.thread_name_prefix,
                self.queue.len()
            );
        }
        self.queue.close();
    }

    fn join_workers(&self) -> Result<()> {
        let mut result = Ok(());
        // Workers leave the list one at a time, so an interrupted join
        // leaves the rest owned by the pool.
        loop {
            let worker = {
                let mut workers = self.workers.lock();
                if workers.is_empty() {
                    break;
                }
                workers.remove(0)
            };
            if let Err(e) = worker.join() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        self.state
            .store(PoolState::Stopped as u8, Ordering::Release);
        debug!(
            "thread pool '{}' stopped after {} tasks",
            self.config.thread_name_prefix,
            self.total_completed()
        );
        result
    }

    /// Number of workers the pool was built with
    pub fn size(&self) -> usize {
        self.config.num_workers
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Check if the pool accepts tasks
    pub fn is_running(&self) -> bool {
        self.state() == PoolState::Running
    }

    /// Tasks waiting in the queue.
    ///
    /// The value may change between checking and using it.
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    /// Workers whose thread is still alive.
    ///
    /// Drops below [`size`](Self::size) when workers retire under
    /// [`PanicPolicy::TerminateWorker`], and reaches zero once joined.
    pub fn live_workers(&self) -> usize {
        self.workers
            .lock()
            .iter()
            .filter(|w| !w.is_finished())
            .count()
    }

    /// Get total number of tasks submitted
    pub fn total_submitted(&self) -> u64 {
        self.total_submitted.load(Ordering::Relaxed)
    }

    /// Get total tasks completed across all workers
    pub fn total_completed(&self) -> u64 {
        self.worker_stats
            .iter()
            .map(|s| s.get_tasks_completed())
            .sum()
    }

    /// Get total tasks panicked across all workers
    pub fn total_panicked(&self) -> u64 {
        self.worker_stats
            .iter()
            .map(|s| s.get_tasks_panicked())
            .sum()
    }

    /// Get statistics for all workers, in worker id order
    pub fn worker_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.worker_stats.iter().map(Arc::clone).collect()
    }

    /// Snapshot of every counter the pool keeps
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            state: self.state(),
            num_workers: self.config.num_workers,
            live_workers: self.live_workers(),
            pending_tasks: self.pending_tasks(),
            total_submitted: self.total_submitted(),
            total_completed: self.total_completed(),
            total_panicked: self.total_panicked(),
            workers: self
                .worker_stats
                .iter()
                .enumerate()
                .map(|(id, s)| s.snapshot(id))
                .collect(),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.state() == PoolState::Stopped {
            return;
        }
        if let Err(e) = self.join_timeout(self.config.join_timeout) {
            warn!(
                "thread pool '{}' dropped before its workers finished: {}",
                self.config.thread_name_prefix, e
            );
        }
    }
}
