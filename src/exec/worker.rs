// src/exec/worker.rs

//! Worker thread loop and panic-contained job execution.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error};

use crate::dag::{JobTask, ReadyJob};
use crate::engine::runtime::Shared;
use crate::types::{JobId, JobOutcome};

/// Spawn worker `index` as a named OS thread.
pub(crate) fn spawn_worker(
    index: usize,
    name_prefix: &str,
    shared: Arc<Shared>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{name_prefix}-{index}"))
        .spawn(move || worker_loop(index, &shared))
}

/// Idle -> dispatching -> executing -> completing, until the queue closes.
///
/// No scheduler lock is held while the job body runs.
fn worker_loop(index: usize, shared: &Shared) {
    debug!(worker = index, "worker started");

    while let Some(job) = shared.next_job() {
        let ReadyJob { id, priority, task } = job;
        debug!(worker = index, job_id = id, priority, "job dispatched");

        shared.mark_running(id);
        let outcome = run_job(index, id, task);
        shared.finish(id, outcome);
    }

    debug!(worker = index, "worker stopped");
}

/// Run a job body, turning a panic or an `Err` into [`JobOutcome::Failed`].
fn run_job(worker: usize, id: JobId, task: JobTask) -> JobOutcome {
    let started = Instant::now();

    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => {
            debug!(
                worker,
                job_id = id,
                elapsed_us = started.elapsed().as_micros() as u64,
                "job completed"
            );
            JobOutcome::Completed
        }
        Ok(Err(err)) => {
            let reason = format!("{err:#}");
            error!(worker, job_id = id, error = %reason, "job returned an error");
            JobOutcome::Failed { reason }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(worker, job_id = id, panic = %message, "job panicked");
            JobOutcome::Failed {
                reason: format!("panicked: {message}"),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
