//! Thread pool and worker implementations

pub mod thread_pool;
pub mod worker;

pub use thread_pool::{PoolConfig, PoolState, PoolStats, ThreadPool};
pub use worker::{PanicPolicy, Worker, WorkerOptions, WorkerStatSnapshot, WorkerStats};
