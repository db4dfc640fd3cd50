// src/engine/runtime.rs

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::dag::{JobRegistry, JobTask, ReadyJob, Submission};
use crate::engine::queue::ReadyQueue;
use crate::engine::{SchedulerOptions, SchedulerStats, ShutdownReport};
use crate::errors::{JobgraphError, Result};
use crate::exec::worker::spawn_worker;
use crate::types::{FailurePolicy, JobId, JobOutcome, JobState, Priority};

/// State shared between the scheduler handle and its workers.
///
/// Two independently guarded pieces:
/// - `registry` (job records, completed set, dependency bookkeeping) with
///   `job_finished`, signalled whenever a job becomes terminal;
/// - `queue` (ready jobs, shutdown flag) with `work_available`, signalled
///   whenever a job is queued or the queue closes.
///
/// Neither lock is ever held while a job runs, and the queue lock is never
/// held while taking the registry lock.
pub(crate) struct Shared {
    registry: Mutex<JobRegistry>,
    job_finished: Condvar,
    queue: Mutex<ReadyQueue>,
    work_available: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn new(policy: FailurePolicy) -> Self {
        Self {
            registry: Mutex::new(JobRegistry::new(policy)),
            job_finished: Condvar::new(),
            queue: Mutex::new(ReadyQueue::new()),
            work_available: Condvar::new(),
        }
    }

    /// Block until a job is available or the queue closes.
    pub(crate) fn next_job(&self) -> Option<ReadyJob> {
        let mut queue = lock(&self.queue);
        loop {
            if queue.is_closed() {
                return None;
            }
            if let Some(job) = queue.pop() {
                return Some(job);
            }
            queue = self
                .work_available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn mark_running(&self, id: JobId) {
        lock(&self.registry).mark_running(id);
    }

    /// Record a job's outcome, wake waiters and queue newly ready dependents.
    pub(crate) fn finish(&self, id: JobId, outcome: JobOutcome) {
        let step = lock(&self.registry).complete(id, outcome);
        self.job_finished.notify_all();
        self.enqueue(step.newly_ready);
    }

    fn enqueue(&self, jobs: Vec<ReadyJob>) {
        let count = jobs.len();
        if count == 0 {
            return;
        }

        let mut rejected = Vec::new();
        {
            let mut queue = lock(&self.queue);
            for job in jobs {
                if let Err(job) = queue.push(job) {
                    rejected.push(job);
                }
            }
        }

        if count == 1 {
            self.work_available.notify_one();
        } else {
            self.work_available.notify_all();
        }

        for job in rejected {
            debug!(job_id = job.id, "queue closed; ready job will be abandoned");
        }
    }

    /// Close the queue and wake every worker. Returns the ready jobs that
    /// were still waiting for a worker.
    fn close_queue(&self) -> Vec<ReadyJob> {
        let dropped = {
            let mut queue = lock(&self.queue);
            queue.close();
            queue.drain()
        };
        self.work_available.notify_all();
        dropped
    }
}

/// Dependency-aware job scheduler backed by a fixed pool of OS threads.
///
/// # Priority
///
/// **Lower priority values are dispatched first.** Among ready jobs with
/// equal priority, the one submitted first runs first.
///
/// # Waiting
///
/// [`wait_for_job`](Self::wait_for_job) and [`wait_for_all`](Self::wait_for_all)
/// block the calling thread on a condition variable. Calling them from inside
/// a job can deadlock if the awaited work needs the worker that is waiting.
///
/// # Shutdown
///
/// [`shutdown`](Self::shutdown) (or dropping the scheduler) lets running jobs
/// finish, then abandons every job that was still queued or blocked. Abandoned
/// jobs never run and are listed in the returned [`ShutdownReport`].
/// Dropping the last `Arc<JobScheduler>` from inside a job is allowed; that
/// job's own worker is not waited for.
pub struct JobScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
    policy: FailurePolicy,
    stopped: bool,
}

impl fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobScheduler")
            .field("worker_count", &self.worker_count)
            .field("policy", &self.policy)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl JobScheduler {
    /// Spawn the worker pool.
    ///
    /// If a worker thread cannot be created, the workers spawned so far are
    /// stopped and joined and [`JobgraphError::WorkerSpawn`] is returned.
    pub fn new(options: SchedulerOptions) -> Result<Self> {
        let worker_count = options.resolved_worker_count();
        let policy = options.failure_policy;
        let shared = Arc::new(Shared::new(policy));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            match spawn_worker(index, &options.thread_name_prefix, Arc::clone(&shared)) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    error!(worker = index, error = %err, "failed to spawn worker thread");
                    shared.close_queue();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(JobgraphError::WorkerSpawn(err));
                }
            }
        }

        info!(workers = worker_count, ?policy, "job scheduler started");

        Ok(Self {
            shared,
            workers,
            worker_count,
            policy,
            stopped: false,
        })
    }

    /// Scheduler with `workers` threads and default options otherwise.
    pub fn with_workers(workers: usize) -> Result<Self> {
        Self::new(SchedulerOptions::with_workers(workers))
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Submit a job with no dependencies. It is queued immediately.
    pub fn schedule_job<F>(&self, task: F, priority: Priority) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        let submission = lock(&self.shared.registry).submit_independent(wrap(task), priority);
        self.dispatch(submission, 0)
    }

    /// Submit a job that may only start after every job in `deps` has
    /// completed.
    ///
    /// Unknown dependency ids are rejected with
    /// [`JobgraphError::UnknownDependency`] and nothing is registered.
    pub fn schedule_job_with_deps<F>(
        &self,
        task: F,
        deps: &[JobId],
        priority: Priority,
    ) -> Result<JobId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(wrap(task), deps, priority)
    }

    /// Like [`schedule_job_with_deps`](Self::schedule_job_with_deps), for
    /// tasks that report failure through `anyhow::Result`. An `Err` marks the
    /// job failed.
    pub fn schedule_fallible_job<F>(
        &self,
        task: F,
        deps: &[JobId],
        priority: Priority,
    ) -> Result<JobId>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.submit(Box::new(task), deps, priority)
    }

    fn submit(&self, task: JobTask, deps: &[JobId], priority: Priority) -> Result<JobId> {
        let submission = lock(&self.shared.registry).submit(task, deps, priority)?;
        Ok(self.dispatch(submission, deps.len()))
    }

    fn dispatch(&self, submission: Submission, dep_count: usize) -> JobId {
        let Submission { id, ready } = submission;
        match ready {
            Some(job) => {
                debug!(job_id = id, priority = job.priority, deps = dep_count, "job submitted; ready");
                self.shared.enqueue(vec![job]);
            }
            None => {
                debug!(job_id = id, deps = dep_count, "job submitted; waiting on dependencies");
            }
        }
        id
    }

    /// Make `dependent` wait for `dependency`.
    ///
    /// `dependent` may be blocked or still sitting in the ready queue; in the
    /// latter case it is taken back out until the new dependency completes.
    /// Once a worker has popped it, [`JobgraphError::AlreadyDispatched`] is
    /// returned.
    ///
    /// The check and the edge insertion happen under the registry lock, so a
    /// dependency cannot complete in between and leave the edge unnoticed.
    pub fn add_dependency(&self, dependent: JobId, dependency: JobId) -> Result<()> {
        let failed = {
            let mut registry = lock(&self.shared.registry);
            // Registry -> queue is the permitted nesting order.
            registry.add_dependency(dependent, dependency, || {
                lock(&self.shared.queue)
                    .remove(dependent)
                    .map(|job| job.task)
            })?
        };
        if !failed.is_empty() {
            self.shared.job_finished.notify_all();
        }
        Ok(())
    }

    /// Block until the job reaches a terminal state and return its outcome.
    pub fn wait_for_job(&self, id: JobId) -> Result<JobOutcome> {
        self.wait_until(id, None)?
            .ok_or(JobgraphError::UnknownJob(id))
    }

    /// [`wait_for_job`](Self::wait_for_job) with an upper bound. Returns
    /// `Ok(None)` if the job is still pending when `timeout` elapses.
    pub fn wait_for_job_timeout(&self, id: JobId, timeout: Duration) -> Result<Option<JobOutcome>> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(id, Some(deadline)),
            None => self.wait_until(id, None),
        }
    }

    /// Shared wait loop; `Ok(None)` means the deadline passed. While blocked
    /// the caller is counted as a waiter, so `clear_completed` keeps the
    /// record until the outcome has been read.
    fn wait_until(&self, id: JobId, deadline: Option<Instant>) -> Result<Option<JobOutcome>> {
        let mut registry = lock(&self.shared.registry);
        if let Some(outcome) = registry.outcome_of(id)? {
            return Ok(Some(outcome));
        }

        registry.add_waiter(id);
        let result = loop {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Ok(None);
                    }
                    let (guard, _) = self
                        .shared
                        .job_finished
                        .wait_timeout(registry, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    registry = guard;
                }
                None => {
                    registry = self
                        .shared
                        .job_finished
                        .wait(registry)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            match registry.outcome_of(id) {
                Ok(Some(outcome)) => break Ok(Some(outcome)),
                Ok(None) => {}
                Err(err) => break Err(err),
            }
        };
        registry.remove_waiter(id);
        result
    }

    /// Block until every submitted job is terminal: nothing queued, nothing
    /// running, nothing blocked on dependencies.
    pub fn wait_for_all(&self) {
        let mut registry = lock(&self.shared.registry);
        while !registry.is_idle() {
            registry = self
                .shared
                .job_finished
                .wait(registry)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// [`wait_for_all`](Self::wait_for_all) with an upper bound. Returns
    /// `true` if everything finished in time.
    pub fn wait_for_all_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait_for_all();
            return true;
        };

        let mut registry = lock(&self.shared.registry);
        while !registry.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .job_finished
                .wait_timeout(registry, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            registry = guard;
        }
        true
    }

    /// Current lifecycle state, or `None` for unknown (or cleared) ids.
    pub fn job_state(&self, id: JobId) -> Option<JobState> {
        lock(&self.shared.registry).state_of(id)
    }

    /// Immediate dependencies recorded for a job.
    pub fn dependencies_of(&self, id: JobId) -> Option<Vec<JobId>> {
        lock(&self.shared.registry).dependencies_of(id)
    }

    /// Forget every finished job; returns how many were removed.
    ///
    /// Intended for phase boundaries (e.g. between level loads) in
    /// long-running processes. Cleared ids can no longer be waited on or used
    /// as dependencies. A finished job that a thread is still blocked on is
    /// kept until a later call.
    pub fn clear_completed(&self) -> usize {
        lock(&self.shared.registry).clear_completed()
    }

    pub fn stats(&self) -> SchedulerStats {
        let counts = lock(&self.shared.registry).counts();
        SchedulerStats {
            workers: self.worker_count,
            blocked: counts.blocked,
            queued: counts.queued,
            running: counts.running,
            completed: counts.completed,
            failed: counts.failed,
            abandoned: counts.abandoned,
        }
    }

    /// Stop the pool: running jobs finish, queued and blocked jobs are
    /// abandoned.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.stop()
    }

    fn stop(&mut self) -> ShutdownReport {
        if self.stopped {
            return ShutdownReport::default();
        }
        self.stopped = true;

        let dropped = self.shared.close_queue();
        info!(
            workers = self.workers.len(),
            dropped = dropped.len(),
            "shutting down job scheduler; waiting for running jobs"
        );
        drop(dropped);

        // A job may drop the last handle to its own scheduler. That worker
        // cannot join itself; it exits on its own once the job returns.
        let current = thread::current().id();
        for handle in self.workers.drain(..) {
            if handle.thread().id() == current {
                debug!("scheduler stopped from one of its workers; not joining it");
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread panicked outside of a job");
            }
        }

        let (abandoned, counts) = {
            let mut registry = lock(&self.shared.registry);
            let abandoned = registry.abandon_unfinished();
            (abandoned, registry.counts())
        };
        self.shared.job_finished.notify_all();

        if !abandoned.is_empty() {
            warn!(
                count = abandoned.len(),
                ids = ?abandoned,
                "jobs abandoned at shutdown without running"
            );
        }
        info!(
            completed = counts.completed,
            failed = counts.failed,
            "job scheduler stopped"
        );

        ShutdownReport {
            completed: counts.completed,
            failed: counts.failed,
            abandoned,
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wrap<F>(task: F) -> JobTask
where
    F: FnOnce() + Send + 'static,
{
    Box::new(move || {
        task();
        Ok(())
    })
}
