//! Task type executed by the pool

use std::fmt;

type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work submitted to the pool.
///
/// A task owns its closure and is consumed by [`Task::run`], so it can be
/// invoked at most once.
pub struct Task {
    func: TaskFn,
    name: String,
}

impl Task {
    /// Create a new task from a closure
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_name(func, "task")
    }

    /// Create a new task with a diagnostic name
    pub fn with_name<F, S>(func: F, name: S) -> Self
    where
        F: FnOnce() + Send + 'static,
        S: Into<String>,
    {
        Self {
            func: Box::new(func),
            name: name.into(),
        }
    }

    /// Name used in logs and panic reports
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the task on the calling thread
    pub fn run(self) {
        (self.func)()
    }
}

impl<F> From<F> for Task
where
    F: FnOnce() + Send + 'static,
{
    fn from(func: F) -> Self {
        Task::new(func)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.name)
    }
}
