// src/dag/registry.rs

//! Single-threaded job bookkeeping.
//!
//! The registry has no locks, threads or condvars. `engine::runtime` keeps
//! it behind one mutex, so every method here runs atomically with respect to
//! every other one. That covers readiness checks, dependency edits and
//! completion handling.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::job::{JobRecord, JobTask, ReadyJob};
use crate::errors::{JobgraphError, Result};
use crate::types::{FailurePolicy, JobId, JobOutcome, JobState, Priority};

/// Result of registering a new job.
#[derive(Debug)]
pub struct Submission {
    pub id: JobId,
    /// Set when the job can go straight to the ready queue.
    pub ready: Option<ReadyJob>,
}

/// What changed when a job reached a terminal state.
#[derive(Debug, Default)]
pub struct CompletionStep {
    /// Dependents whose last outstanding dependency just got satisfied.
    pub newly_ready: Vec<ReadyJob>,
    /// Dependents failed without running, under [`FailurePolicy::Propagate`].
    pub newly_failed: Vec<JobId>,
}

/// Job counts grouped by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub blocked: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Registry of every known job plus the dependency index.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: HashMap<JobId, JobRecord>,
    graph: DependencyGraph,
    policy: FailurePolicy,
    /// Last id handed out; ids start at 1.
    last_id: JobId,
    /// Jobs that are blocked, queued or running.
    unfinished: usize,
}

impl JobRegistry {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            jobs: HashMap::new(),
            graph: DependencyGraph::new(),
            policy,
            last_id: 0,
            unfinished: 0,
        }
    }

    /// Number of jobs that have not reached a terminal state.
    pub fn unfinished(&self) -> usize {
        self.unfinished
    }

    pub fn is_idle(&self) -> bool {
        self.unfinished == 0
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn state_of(&self, id: JobId) -> Option<JobState> {
        self.jobs.get(&id).map(|r| r.state.clone())
    }

    /// `Ok(Some(outcome))` once the job is terminal, `Ok(None)` while it is
    /// still pending, `Err(UnknownJob)` if the id is not registered.
    pub fn outcome_of(&self, id: JobId) -> Result<Option<JobOutcome>> {
        let record = self.jobs.get(&id).ok_or(JobgraphError::UnknownJob(id))?;
        match &record.state {
            JobState::Finished(outcome) => Ok(Some(outcome.clone())),
            _ => Ok(None),
        }
    }

    pub fn dependencies_of(&self, id: JobId) -> Option<Vec<JobId>> {
        if !self.jobs.contains_key(&id) {
            return None;
        }
        Some(self.graph.dependencies_of(id))
    }

    /// Register a new job.
    ///
    /// Every dependency must name a registered job; unknown ids are rejected
    /// before an id is allocated. Dependencies that already satisfy their
    /// dependents are not counted as outstanding.
    pub fn submit(
        &mut self,
        task: JobTask,
        deps: &[JobId],
        priority: Priority,
    ) -> Result<Submission> {
        let deps: BTreeSet<JobId> = deps.iter().copied().collect();
        if let Some(&unknown) = deps.iter().find(|d| !self.jobs.contains_key(d)) {
            return Err(JobgraphError::UnknownDependency(unknown));
        }
        Ok(self.register(task, deps, priority))
    }

    /// Register a job with no dependencies; it is always ready.
    pub fn submit_independent(&mut self, task: JobTask, priority: Priority) -> Submission {
        self.register(task, BTreeSet::new(), priority)
    }

    fn register(&mut self, task: JobTask, deps: BTreeSet<JobId>, priority: Priority) -> Submission {
        self.last_id += 1;
        let id = self.last_id;

        let mut record = JobRecord::new(id, priority, task);
        let mut failed_dependency = None;

        self.graph.add_job(id);
        for &dep in &deps {
            self.graph.add_edge(dep, id);
            match &self.jobs[&dep].state {
                JobState::Finished(outcome) if outcome.satisfies_dependents(self.policy) => {}
                JobState::Finished(_) => {
                    if failed_dependency.is_none() {
                        failed_dependency = Some(dep);
                    }
                }
                _ => record.outstanding += 1,
            }
        }

        if let Some(dep) = failed_dependency {
            warn!(
                job_id = id,
                dependency = dep,
                "dependency already failed; job will not run"
            );
            record.task = None;
            record.state = JobState::Finished(JobOutcome::Failed {
                reason: format!("dependency {dep} failed"),
            });
            self.jobs.insert(id, record);
            return Submission { id, ready: None };
        }

        self.unfinished += 1;

        let ready = if record.outstanding == 0 {
            record.state = JobState::Queued;
            record.task.take().map(|task| ReadyJob { id, priority, task })
        } else {
            debug!(
                job_id = id,
                outstanding = record.outstanding,
                "job blocked on dependencies"
            );
            None
        };

        self.jobs.insert(id, record);
        Submission { id, ready }
    }

    /// Add `dependency` to a job that no worker has taken yet.
    ///
    /// A queued dependent whose new dependency is not yet satisfied has to
    /// leave the ready queue. The registry does not own the queue, so
    /// `reclaim` is asked for the job's task back. It returns `None` when a
    /// worker popped the job in the meantime, which counts as dispatched.
    ///
    /// Returns the jobs that were failed as a consequence (non-empty only
    /// when `dependency` has already failed under `Propagate`).
    pub fn add_dependency<F>(
        &mut self,
        dependent: JobId,
        dependency: JobId,
        reclaim: F,
    ) -> Result<Vec<JobId>>
    where
        F: FnOnce() -> Option<JobTask>,
    {
        let dependent_state = self
            .jobs
            .get(&dependent)
            .map(|r| r.state.clone())
            .ok_or(JobgraphError::UnknownJob(dependent))?;
        let dependency_state = self
            .jobs
            .get(&dependency)
            .map(|r| r.state.clone())
            .ok_or(JobgraphError::UnknownDependency(dependency))?;

        if dependent == dependency {
            return Err(JobgraphError::SelfDependency(dependent));
        }
        if dependent_state.is_dispatched() {
            return Err(JobgraphError::AlreadyDispatched(dependent));
        }
        if self.graph.has_edge(dependency, dependent) {
            return Ok(Vec::new());
        }
        if self.graph.would_create_cycle(dependent, dependency) {
            return Err(JobgraphError::DependencyCycle {
                dependent,
                dependency,
            });
        }

        let satisfied = match &dependency_state {
            JobState::Finished(outcome) => outcome.satisfies_dependents(self.policy),
            _ => false,
        };

        if !satisfied && dependent_state == JobState::Queued {
            let Some(task) = reclaim() else {
                return Err(JobgraphError::AlreadyDispatched(dependent));
            };
            if let Some(record) = self.jobs.get_mut(&dependent) {
                record.task = Some(task);
                record.state = JobState::Blocked;
            }
        }

        self.graph.add_edge(dependency, dependent);

        match dependency_state {
            _ if satisfied => {
                debug!(dependent, dependency, "dependency already satisfied");
                Ok(Vec::new())
            }
            JobState::Finished(_) => {
                warn!(dependent, dependency, "dependency already failed; failing dependent");
                let mut failed = vec![dependent];
                self.finish_without_running(dependent, dependency);
                failed.extend(self.fail_dependents(dependent));
                Ok(failed)
            }
            _ => {
                if let Some(record) = self.jobs.get_mut(&dependent) {
                    record.outstanding += 1;
                    debug!(
                        dependent,
                        dependency,
                        outstanding = record.outstanding,
                        "dependency edge added"
                    );
                }
                Ok(Vec::new())
            }
        }
    }

    /// Register a thread about to block on `id`.
    pub fn add_waiter(&mut self, id: JobId) {
        if let Some(record) = self.jobs.get_mut(&id) {
            record.waiters += 1;
        }
    }

    pub fn remove_waiter(&mut self, id: JobId) {
        if let Some(record) = self.jobs.get_mut(&id) {
            record.waiters = record.waiters.saturating_sub(1);
        }
    }

    /// Record that a worker has picked the job up.
    pub fn mark_running(&mut self, id: JobId) {
        match self.jobs.get_mut(&id) {
            Some(record) if record.state == JobState::Queued => {
                record.state = JobState::Running;
            }
            Some(record) => {
                warn!(job_id = id, state = ?record.state, "mark_running on a job that is not queued");
            }
            None => warn!(job_id = id, "mark_running for unknown job"),
        }
    }

    /// Record the outcome of an executed job and re-evaluate its dependents.
    pub fn complete(&mut self, id: JobId, outcome: JobOutcome) -> CompletionStep {
        let mut step = CompletionStep::default();

        match self.jobs.get_mut(&id) {
            Some(record) if !record.state.is_terminal() => {
                record.state = JobState::Finished(outcome.clone());
                self.unfinished -= 1;
            }
            Some(_) => {
                warn!(job_id = id, "completion for a job that is already terminal; ignoring");
                return step;
            }
            None => {
                warn!(job_id = id, "completion for unknown job; ignoring");
                return step;
            }
        }

        if outcome.satisfies_dependents(self.policy) {
            for dependent in self.graph.dependents_of(id) {
                let Some(record) = self.jobs.get_mut(&dependent) else {
                    continue;
                };
                if record.state != JobState::Blocked {
                    continue;
                }
                record.outstanding = record.outstanding.saturating_sub(1);
                if record.outstanding == 0 {
                    record.state = JobState::Queued;
                    if let Some(task) = record.task.take() {
                        debug!(job_id = dependent, after = id, "dependencies satisfied; job ready");
                        step.newly_ready.push(ReadyJob {
                            id: dependent,
                            priority: record.priority,
                            task,
                        });
                    }
                }
            }
        } else {
            step.newly_failed = self.fail_dependents(id);
            if !step.newly_failed.is_empty() {
                warn!(
                    job_id = id,
                    failed = ?step.newly_failed,
                    "job failed; failing blocked dependents"
                );
            }
        }

        step
    }

    /// Mark every blocked dependent of `failed` (transitively) as failed.
    ///
    /// Returns the newly failed ids, excluding `failed` itself.
    fn fail_dependents(&mut self, failed: JobId) -> Vec<JobId> {
        let mut stack: Vec<(JobId, JobId)> = self
            .graph
            .dependents_of(failed)
            .into_iter()
            .map(|d| (d, failed))
            .collect();
        let mut newly_failed = Vec::new();

        while let Some((id, cause)) = stack.pop() {
            let blocked = self
                .jobs
                .get(&id)
                .is_some_and(|r| r.state == JobState::Blocked);
            if !blocked {
                continue;
            }
            self.finish_without_running(id, cause);
            newly_failed.push(id);
            stack.extend(self.graph.dependents_of(id).into_iter().map(|d| (d, id)));
        }

        newly_failed
    }

    fn finish_without_running(&mut self, id: JobId, cause: JobId) {
        if let Some(record) = self.jobs.get_mut(&id) {
            debug!(job_id = id, cause, "marking job failed due to upstream failure");
            record.task = None;
            record.state = JobState::Finished(JobOutcome::Failed {
                reason: format!("dependency {cause} failed"),
            });
            self.unfinished -= 1;
        }
    }

    /// Mark every blocked or queued job as abandoned and drop its task.
    ///
    /// Used at shutdown; returns the abandoned ids in ascending order.
    /// Running jobs are left alone and still report their own outcome.
    pub fn abandon_unfinished(&mut self) -> Vec<JobId> {
        let mut abandoned: Vec<JobId> = self
            .jobs
            .values_mut()
            .filter(|r| matches!(r.state, JobState::Blocked | JobState::Queued))
            .map(|r| {
                r.task = None;
                r.state = JobState::Finished(JobOutcome::Abandoned);
                r.id
            })
            .collect();
        abandoned.sort_unstable();
        self.unfinished -= abandoned.len();
        abandoned
    }

    /// Forget every terminal job nobody is waiting on.
    ///
    /// Cleared ids are never handed out again and become unknown to later
    /// submissions, dependency edits and waits. A job with a blocked waiter
    /// survives until a later call, so that waiter still sees its outcome.
    pub fn clear_completed(&mut self) -> usize {
        let terminal: Vec<JobId> = self
            .jobs
            .values()
            .filter(|r| r.state.is_terminal() && r.waiters == 0)
            .map(|r| r.id)
            .collect();

        for id in &terminal {
            self.jobs.remove(id);
            self.graph.remove_job(*id);
        }

        if !terminal.is_empty() {
            info!(cleared = terminal.len(), remaining = self.jobs.len(), "cleared finished jobs");
        }
        terminal.len()
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for record in self.jobs.values() {
            match &record.state {
                JobState::Blocked => counts.blocked += 1,
                JobState::Queued => counts.queued += 1,
                JobState::Running => counts.running += 1,
                JobState::Finished(JobOutcome::Completed) => counts.completed += 1,
                JobState::Finished(JobOutcome::Failed { .. }) => counts.failed += 1,
                JobState::Finished(JobOutcome::Abandoned) => counts.abandoned += 1,
            }
        }
        counts
    }
}
