// src/engine/mod.rs

//! Thread-pooled execution engine for the job graph.
//!
//! This module ties together:
//! - the job registry (dependency bookkeeping, completed set)
//! - the ready queue (priority-ordered, FIFO on ties)
//! - the worker pool that drains the queue
//!
//! The bookkeeping itself is single-threaded and lives in
//! [`crate::dag::registry`]; [`runtime`] is the synchronisation shell
//! (mutexes, condvars, threads) around it.

use crate::types::{FailurePolicy, JobId};

/// Construction options for [`JobScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Number of worker threads. `None` uses the available hardware
    /// parallelism; zero is clamped to one.
    pub worker_count: Option<usize>,
    /// What a failed job means for its dependents.
    pub failure_policy: FailurePolicy,
    /// Worker threads are named `<prefix>-<index>`.
    pub thread_name_prefix: String,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            worker_count: None,
            failure_policy: FailurePolicy::default(),
            thread_name_prefix: "jobgraph-worker".to_string(),
        }
    }
}

impl SchedulerOptions {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            worker_count: Some(workers),
            ..Self::default()
        }
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Worker count actually used by the scheduler (always >= 1).
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Point-in-time counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub workers: usize,
    pub blocked: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// What happened to outstanding work when the scheduler shut down.
///
/// Jobs already running when shutdown began always finish; jobs that were
/// still queued or blocked are abandoned, never run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: usize,
    pub failed: usize,
    /// Ids of queued or blocked jobs dropped without running.
    pub abandoned: Vec<JobId>,
}

pub mod queue;
pub mod runtime;

pub use queue::ReadyQueue;
pub use runtime::JobScheduler;
