//! Shared FIFO task queue.
//!
//! [`TaskQueue`] is the only state shared between the pool and its workers.
//! Every operation runs under one mutex, so the order in which tasks are
//! enqueued is the order in which they are handed out, across all producers.
//!
//! Removal is always "wait for an item, then take it" inside a single
//! critical section. There is no separate emptiness check a caller has to
//! pair with a pop, so two workers can never race for the last task.
//!
//! ```rust
//! use work_pool::queue::TaskQueue;
//! use work_pool::Task;
//!
//! let queue = TaskQueue::new();
//! queue.enqueue(Task::new(|| println!("hello"))).unwrap();
//! queue.close();
//!
//! // Closed queues still hand out what they hold, then report the end.
//! while let Some(task) = queue.dequeue() {
//!     task.run();
//! }
//! ```

use crate::core::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Errors returned by [`TaskQueue`] operations
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue was closed; the rejected task is handed back
    #[error("Task queue is closed")]
    Closed(Task),

    /// No task became available before the timeout
    #[error("Task queue is empty")]
    Empty,

    /// The queue is closed and fully drained
    #[error("Task queue is closed and drained")]
    Disconnected,
}

impl QueueError {
    /// Recover the task rejected by a closed queue
    pub fn into_task(self) -> Option<Task> {
        match self {
            QueueError::Closed(task) => Some(task),
            _ => None,
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// An unbounded, mutex-protected FIFO of pending tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TaskQueue {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task to the back of the queue and wakes one waiting consumer.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] carrying the task if the queue has been closed.
    pub fn enqueue(&self, task: Task) -> QueueResult<()> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed(task));
            }
            state.tasks.push_back(task);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Removes the front task, blocking while the queue is open and empty.
    ///
    /// Returns `None` once the queue is closed and every task has been handed out.
    pub fn dequeue(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Removes the front task if there is one, without blocking.
    pub fn try_dequeue(&self) -> Option<Task> {
        self.state.lock().tasks.pop_front()
    }

    /// Removes the front task, waiting at most `timeout` for one to arrive.
    ///
    /// # Returns
    ///
    /// - `Ok(task)` if a task was available within the timeout
    /// - `Err(QueueError::Empty)` if the timeout elapsed first
    /// - `Err(QueueError::Disconnected)` if the queue is closed and empty
    pub fn dequeue_timeout(&self, timeout: Duration) -> QueueResult<Task> {
        // A deadline past the end of `Instant` means wait without bound.
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => return self.dequeue().ok_or(QueueError::Disconnected),
        };
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Ok(task);
            }
            if state.closed {
                return Err(QueueError::Disconnected);
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return match state.tasks.pop_front() {
                    Some(task) => Ok(task),
                    None if state.closed => Err(QueueError::Disconnected),
                    None => Err(QueueError::Empty),
                };
            }
        }
    }

    /// Reports whether the queue held at least one task at the time of the call.
    ///
    /// The answer may be stale as soon as the lock is released; use
    /// [`try_dequeue`](Self::try_dequeue) to take a task conditionally.
    pub fn has_item(&self) -> bool {
        !self.state.lock().tasks.is_empty()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Returns `true` if no task is pending.
    pub fn is_empty(&self) -> bool {
        !self.has_item()
    }

    /// Stops accepting tasks and wakes every blocked consumer.
    ///
    /// Tasks already queued can still be dequeued.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Removes and returns every pending task in FIFO order.
    pub fn drain(&self) -> Vec<Task> {
        self.state.lock().tasks.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn labelled(label: usize) -> Task {
        Task::with_name(|| {}, label.to_string())
    }

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new();
        for i in 0..5 {
            queue.enqueue(labelled(i)).unwrap();
        }

        let names: Vec<String> = (0..5)
            .map(|_| queue.dequeue().unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_has_item_and_len() {
        let queue = TaskQueue::new();
        assert!(!queue.has_item());
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);

        queue.enqueue(labelled(0)).unwrap();
        assert!(queue.has_item());
        assert_eq!(queue.len(), 1);

        queue.try_dequeue().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_try_dequeue_empty() {
        let queue = TaskQueue::new();
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_dequeue_timeout_empty() {
        let queue = TaskQueue::new();
        match queue.dequeue_timeout(Duration::from_millis(10)) {
            Err(QueueError::Empty) => {}
            other => panic!("expected Empty error on timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_dequeue_timeout_disconnected() {
        let queue = TaskQueue::new();
        queue.close();
        match queue.dequeue_timeout(Duration::from_millis(10)) {
            Err(QueueError::Disconnected) => {}
            other => panic!("expected Disconnected error, got {:?}", other),
        }
    }

    #[test]
    fn test_dequeue_timeout_receives_late_task() {
        let queue = Arc::new(TaskQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.enqueue(labelled(9)).unwrap();
            })
        };

        let task = queue
            .dequeue_timeout(Duration::from_secs(5))
            .expect("task should arrive before the timeout");
        assert_eq!(task.name(), "9");
        producer.join().unwrap();
    }

    #[test]
    fn test_dequeue_timeout_with_unrepresentable_deadline() {
        let queue = TaskQueue::new();
        queue.enqueue(labelled(1)).unwrap();

        let task = queue.dequeue_timeout(Duration::MAX).unwrap();
        assert_eq!(task.name(), "1");

        queue.close();
        assert!(matches!(
            queue.dequeue_timeout(Duration::MAX),
            Err(QueueError::Disconnected)
        ));
    }

    #[test]
    fn test_enqueue_after_close_returns_task() {
        let queue = TaskQueue::new();
        queue.close();
        assert!(queue.is_closed());

        let err = queue.enqueue(labelled(7)).unwrap_err();
        let task = err.into_task().expect("closed error should carry the task");
        assert_eq!(task.name(), "7");
    }

    #[test]
    fn test_close_drains_before_disconnect() {
        let queue = TaskQueue::new();
        queue.enqueue(labelled(0)).unwrap();
        queue.enqueue(labelled(1)).unwrap();
        queue.close();

        assert_eq!(queue.dequeue().unwrap().name(), "0");
        assert_eq!(queue.dequeue().unwrap().name(), "1");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_dequeue_blocks_until_enqueue() {
        let queue = Arc::new(TaskQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue().map(|t| t.name().to_string()))
        };

        thread::sleep(Duration::from_millis(50));
        queue.enqueue(labelled(42)).unwrap();

        assert_eq!(consumer.join().unwrap().as_deref(), Some("42"));
    }

    #[test]
    fn test_close_wakes_blocked_consumers() {
        let queue = Arc::new(TaskQueue::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.dequeue().is_none())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();

        for consumer in consumers {
            assert!(consumer.join().unwrap());
        }
    }

    #[test]
    fn test_drain() {
        let queue = TaskQueue::new();
        for i in 0..3 {
            queue.enqueue(labelled(i)).unwrap();
        }

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].name(), "0");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_try_dequeue_takes_each_task_once() {
        let queue = Arc::new(TaskQueue::new());
        let num_tasks = 1000;
        for i in 0..num_tasks {
            queue.enqueue(labelled(i)).unwrap();
        }

        let taken = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let taken = Arc::clone(&taken);
                thread::spawn(move || {
                    while queue.try_dequeue().is_some() {
                        taken.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(taken.load(Ordering::SeqCst), num_tasks);
        assert!(queue.is_empty());
    }
}
