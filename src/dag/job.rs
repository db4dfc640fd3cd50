// src/dag/job.rs

//! Job records owned by the registry, and the hand-off type used once a job
//! becomes ready.

use std::fmt;

use crate::types::{JobId, JobState, Priority};

/// Boxed body of a job. Infallible closures are wrapped to return `Ok(())`.
pub type JobTask = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Registry-side bookkeeping for one submitted job.
pub struct JobRecord {
    pub id: JobId,
    pub priority: Priority,
    pub state: JobState,
    /// Present until the job is handed to the ready queue (or dropped when
    /// the job fails or is abandoned before dispatch).
    pub task: Option<JobTask>,
    /// Number of dependencies that have not been satisfied yet.
    pub outstanding: usize,
    /// Threads blocked in a wait on this job; keeps the record alive across
    /// `clear_completed` until they have read the outcome.
    pub waiters: usize,
}

impl JobRecord {
    pub fn new(id: JobId, priority: Priority, task: JobTask) -> Self {
        Self {
            id,
            priority,
            state: JobState::Blocked,
            task: Some(task),
            outstanding: 0,
            waiters: 0,
        }
    }
}

impl fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRecord")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("has_task", &self.task.is_some())
            .field("outstanding", &self.outstanding)
            .field("waiters", &self.waiters)
            .finish()
    }
}

/// A job whose dependencies are satisfied, on its way to a worker.
pub struct ReadyJob {
    pub id: JobId,
    pub priority: Priority,
    pub task: JobTask,
}

impl fmt::Debug for ReadyJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyJob")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
