use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier handed out by the scheduler for every submitted job.
///
/// Ids start at 1, increase with submission order and are never reused.
pub type JobId = u64;

/// Dispatch priority of a job.
///
/// **Lower values run first.** Jobs with equal priority run in submission
/// order.
pub type Priority = i32;

/// What a failed job means for the jobs that depend on it.
///
/// - `Propagate`: dependents never run; they (and their own dependents) are
///   marked failed as well (default behaviour).
/// - `Continue`: a failed job satisfies its dependents exactly like a
///   completed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Propagate,
    Continue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Propagate
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "propagate" => Ok(FailurePolicy::Propagate),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"propagate\" or \"continue\")"
            )),
        }
    }
}

/// Final result of a job, as observed by `wait_for_job`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The task returned normally.
    Completed,
    /// The task panicked or returned an error, or a dependency failed under
    /// [`FailurePolicy::Propagate`].
    Failed { reason: String },
    /// The scheduler shut down before the job was dispatched.
    Abandoned,
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed)
    }

    /// Whether dependents may treat this outcome as "dependency satisfied".
    pub fn satisfies_dependents(&self, policy: FailurePolicy) -> bool {
        match self {
            JobOutcome::Completed => true,
            JobOutcome::Failed { .. } => policy == FailurePolicy::Continue,
            JobOutcome::Abandoned => false,
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Completed => write!(f, "completed"),
            JobOutcome::Failed { reason } => write!(f, "failed: {reason}"),
            JobOutcome::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Read-only view of where a job is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Registered, waiting on at least one dependency.
    Blocked,
    /// Sitting in the ready queue.
    Queued,
    /// Picked up by a worker.
    Running,
    /// Terminal.
    Finished(JobOutcome),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished(_))
    }

    /// `true` once a worker has taken the job (running or done). Blocked and
    /// queued jobs may still gain dependencies.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, JobState::Running | JobState::Finished(_))
    }
}
