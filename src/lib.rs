//! # Work Pool
//!
//! A fixed-size worker pool: long-lived threads pull tasks from one shared
//! FIFO queue and run them to completion.
//!
//! ## Features
//!
//! - **Fixed Size**: Workers are spawned once at construction; a pool of zero workers is rejected
//! - **FIFO Queue**: Tasks are handed out in submission order across all producers
//! - **Blocking Dequeue**: Idle workers sleep on a condition variable instead of polling
//! - **Exactly Once**: Every accepted task is run by exactly one worker
//! - **Graceful Shutdown**: `join` drains the queue, then stops and joins every worker
//! - **Panic Containment**: A panicking task is logged and counted; the worker keeps going
//!
//! ## Quick Start
//!
//! ```rust
//! use work_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = ThreadPool::new(4)?;
//!
//! for i in 0..10 {
//!     pool.submit(move || {
//!         println!("Task {} executing", i);
//!     })?;
//! }
//!
//! // Runs everything still queued, then stops the workers
//! pool.join()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use work_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = PoolConfig::new(8)
//!     .with_thread_name_prefix("ingest")
//!     .with_panic_policy(PanicPolicy::Continue)
//!     .with_join_timeout(Duration::from_secs(2));
//!
//! let pool = ThreadPool::with_config(config)?;
//! pool.submit_task(Task::with_name(|| {}, "warmup"))?;
//! pool.join_timeout(Duration::from_secs(2))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Statistics
//!
//! ```rust
//! use work_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! # let pool = ThreadPool::new(2)?;
//! # for _ in 0..10 {
//! #     pool.submit(|| {})?;
//! # }
//! pool.join()?;
//!
//! let stats = pool.stats();
//! for worker in &stats.workers {
//!     println!("Worker {}: {} tasks", worker.worker_id, worker.tasks_completed);
//! }
//! assert_eq!(stats.total_completed, 10);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod queue;

pub use crate::core::{PoolError, Result, Task};
pub use pool::{PanicPolicy, PoolConfig, PoolState, PoolStats, ThreadPool, WorkerStats};
pub use queue::{QueueError, TaskQueue};
