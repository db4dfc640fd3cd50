// src/lib.rs

//! Dependency-aware job scheduler on a fixed pool of worker threads.
//!
//! Subsystems submit closures with a priority (lower runs first) and an
//! optional set of job ids they depend on; the [`JobScheduler`] runs each job
//! exactly once, only after all of its dependencies have completed, and
//! offers blocking waits for a single job or for everything submitted.
//!
//! ```no_run
//! use jobgraph::JobScheduler;
//!
//! let scheduler = JobScheduler::with_workers(4)?;
//! let load = scheduler.schedule_job(|| println!("load"), 0);
//! let bake = scheduler.schedule_job_with_deps(|| println!("bake"), &[load], 0)?;
//! scheduler.wait_for_job(bake)?;
//! # Ok::<(), jobgraph::errors::JobgraphError>(())
//! ```
//!
//! The `jobgraph` binary drives the same scheduler from a TOML job graph of
//! shell commands (see [`run`]).

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{GraphFile, load_and_validate, submission_order};

pub use crate::engine::{JobScheduler, SchedulerOptions, SchedulerStats, ShutdownReport};
pub use crate::errors::JobgraphError;
pub use crate::types::{FailurePolicy, JobId, JobOutcome, JobState, Priority};

/// Per-job results of one graph run, keyed by job name.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: BTreeMap<String, JobOutcome>,
}

impl RunSummary {
    /// Names of jobs that did not complete, in name order.
    pub fn unsuccessful(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_completed())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn all_completed(&self) -> bool {
        self.outcomes.values().all(JobOutcome::is_completed)
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - job graph loading and validation
/// - scheduler construction (`[scheduler]` section, CLI overrides)
/// - submission of every job in dependency order
/// - the final summary and exit status
pub fn run(args: CliArgs) -> Result<()> {
    let mut graph = load_and_validate(&args.config)?;
    if let Some(policy) = args.failure_policy {
        graph.scheduler.failure_policy = policy;
    }

    if args.dry_run {
        print_dry_run(&graph);
        return Ok(());
    }

    let workers = args.workers.map(|n| n as usize);
    let summary = run_graph(&graph, workers)?;

    for (name, outcome) in summary.outcomes.iter() {
        println!("{name}: {outcome}");
    }

    let failed = summary.unsuccessful();
    if !failed.is_empty() {
        bail!("{} job(s) did not complete: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

/// Submit every job of a validated graph, wait for all of them and shut the
/// scheduler down.
///
/// `workers` overrides `[scheduler].workers` when set.
pub fn run_graph(graph: &GraphFile, workers: Option<usize>) -> Result<RunSummary> {
    let mut options = graph.scheduler.to_options();
    if workers.is_some() {
        options.worker_count = workers;
    }

    let scheduler = JobScheduler::new(options)?;
    let mut ids: BTreeMap<String, JobId> = BTreeMap::new();

    for name in submission_order(graph) {
        let Some(job) = graph.job.get(&name) else {
            continue;
        };
        let deps: Vec<JobId> = job.after.iter().filter_map(|d| ids.get(d).copied()).collect();
        let task = exec::shell_task(name.clone(), job.cmd.clone());
        let id = scheduler.schedule_fallible_job(task, &deps, job.priority)?;
        debug!(job = %name, job_id = id, priority = job.priority, ?deps, "submitted job");
        ids.insert(name, id);
    }

    info!(jobs = ids.len(), workers = scheduler.worker_count(), "job graph submitted");
    scheduler.wait_for_all();

    let mut summary = RunSummary::default();
    for (name, id) in ids {
        let outcome = scheduler.wait_for_job(id)?;
        if !outcome.is_completed() {
            warn!(job = %name, job_id = id, %outcome, "job did not complete");
        }
        summary.outcomes.insert(name, outcome);
    }

    let report = scheduler.shutdown();
    info!(
        completed = report.completed,
        failed = report.failed,
        "job graph finished"
    );

    Ok(summary)
}

/// Simple dry-run output: print scheduler settings, jobs, deps and commands.
fn print_dry_run(graph: &GraphFile) {
    println!("jobgraph dry-run");
    match graph.scheduler.workers {
        Some(n) => println!("  scheduler.workers = {n}"),
        None => println!("  scheduler.workers = (available parallelism)"),
    }
    println!(
        "  scheduler.failure_policy = {:?}",
        graph.scheduler.failure_policy
    );
    println!();

    println!("jobs ({}), in submission order:", graph.job.len());
    for name in submission_order(graph) {
        let Some(job) = graph.job.get(&name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", job.cmd);
        println!("      priority: {}", job.priority);
        if !job.after.is_empty() {
            println!("      after: {:?}", job.after);
        }
    }

    debug!("dry-run complete (no execution)");
}
