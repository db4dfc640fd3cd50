#![allow(dead_code, unused_imports)]

use std::time::Duration;

use jobgraph::{JobId, JobScheduler};
use jobgraph_test_utils::gate::Gate;

pub use jobgraph_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const LONG: Duration = Duration::from_secs(5);

/// Occupy `count` workers with jobs that block on `gate`, and wait until all
/// of them are actually parked. Anything scheduled afterwards stays queued
/// until the gate opens.
pub fn park_workers(scheduler: &JobScheduler, gate: &Gate, count: usize) -> Vec<JobId> {
    let ids = (0..count)
        .map(|_| {
            let g = gate.clone();
            scheduler.schedule_job(move || g.wait(), i32::MIN)
        })
        .collect();
    assert!(
        gate.wait_for_waiters(count, LONG),
        "workers did not pick up the gate jobs"
    );
    ids
}
