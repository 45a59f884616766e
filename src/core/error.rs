//! Error types for the worker pool

use crate::pool::PoolState;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur while building, feeding or stopping a pool
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Failed to spawn a worker thread
    #[error("Failed to spawn worker thread #{worker_id}: {message}")]
    Spawn {
        /// ID of the worker that failed to spawn
        worker_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{worker_id}: {message}")]
    Join {
        /// ID of the worker that failed to join
        worker_id: usize,
        /// Error message
        message: String,
    },

    /// Bounded join gave up before every worker exited
    #[error("Join timed out after {timeout_ms}ms with {remaining} workers still running")]
    JoinTimeout {
        /// Workers that had not exited at the deadline
        remaining: usize,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Pool no longer accepts tasks
    #[error("Thread pool is not accepting tasks (state: {state})")]
    ShuttingDown {
        /// State the pool was in when the task was rejected
        state: PoolState,
    },
}

impl PoolError {
    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a spawn error with source
    pub fn spawn(worker_id: usize, source: std::io::Error) -> Self {
        PoolError::Spawn {
            worker_id,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::Join {
            worker_id,
            message: message.into(),
        }
    }

    /// Create a join timeout error
    pub fn join_timeout(remaining: usize, timeout_ms: u64) -> Self {
        PoolError::JoinTimeout {
            remaining,
            timeout_ms,
        }
    }

    /// Create a shutting down error
    pub fn shutting_down(state: PoolState) -> Self {
        PoolError::ShuttingDown { state }
    }
}
