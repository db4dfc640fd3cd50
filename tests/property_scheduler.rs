// tests/property_scheduler.rs

mod common;
use crate::common::init_tracing;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use jobgraph::{FailurePolicy, JobId, JobOutcome, JobScheduler, SchedulerOptions};

/// Random DAG as per-job dependency lists. Acyclic by construction: job `i`
/// may only depend on jobs `0..i`.
fn dag_strategy(max_jobs: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_jobs).prop_flat_map(|num_jobs| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_jobs,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    if i == 0 {
                        return Vec::new();
                    }
                    let deps: BTreeSet<usize> = picks.into_iter().map(|p| p % i).collect();
                    deps.into_iter().collect()
                })
                .collect()
        })
    })
}

struct Tracker {
    runs: Vec<AtomicUsize>,
    finished: Mutex<Vec<bool>>,
    violations: Mutex<Vec<String>>,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_job_runs_once_after_its_dependencies(
        dag in dag_strategy(16),
        workers in 1usize..=3,
        priorities in proptest::collection::vec(-3i32..=3, 16),
    ) {
        init_tracing();

        let tracker = Arc::new(Tracker {
            runs: (0..dag.len()).map(|_| AtomicUsize::new(0)).collect(),
            finished: Mutex::new(vec![false; dag.len()]),
            violations: Mutex::new(Vec::new()),
        });

        let scheduler = JobScheduler::new(
            SchedulerOptions::with_workers(workers).failure_policy(FailurePolicy::Propagate),
        )
        .expect("scheduler");

        let mut ids: Vec<JobId> = Vec::with_capacity(dag.len());
        for (index, deps) in dag.iter().enumerate() {
            let t = Arc::clone(&tracker);
            let deps_for_job = deps.clone();
            let body = move || {
                t.runs[index].fetch_add(1, Ordering::SeqCst);
                {
                    let finished = t.finished.lock().unwrap();
                    for &dep in &deps_for_job {
                        if !finished[dep] {
                            t.violations
                                .lock()
                                .unwrap()
                                .push(format!("job {index} started before dependency {dep}"));
                        }
                    }
                }
                t.finished.lock().unwrap()[index] = true;
            };

            let dep_ids: Vec<JobId> = deps.iter().map(|&d| ids[d]).collect();
            let id = scheduler
                .schedule_job_with_deps(body, &dep_ids, priorities[index])
                .expect("dependencies are registered");
            ids.push(id);
        }

        prop_assert!(scheduler.wait_for_all_timeout(std::time::Duration::from_secs(10)));

        for (index, id) in ids.iter().enumerate() {
            prop_assert_eq!(scheduler.wait_for_job(*id).expect("known job"), JobOutcome::Completed);
            prop_assert_eq!(tracker.runs[index].load(Ordering::SeqCst), 1, "job {} run count", index);
        }
        let violations = tracker.violations.lock().unwrap().clone();
        prop_assert!(violations.is_empty(), "{:?}", violations);

        let report = scheduler.shutdown();
        prop_assert_eq!(report.completed, dag.len());
        prop_assert!(report.abandoned.is_empty());
    }

    #[test]
    fn failures_never_leak_into_unrelated_jobs(
        dag in dag_strategy(12),
        failing in proptest::collection::btree_set(0usize..12, 0..4),
    ) {
        init_tracing();

        let scheduler = JobScheduler::with_workers(2).expect("scheduler");
        let mut ids: Vec<JobId> = Vec::with_capacity(dag.len());
        for (index, deps) in dag.iter().enumerate() {
            let fails = failing.contains(&index);
            let dep_ids: Vec<JobId> = deps.iter().map(|&d| ids[d]).collect();
            let id = scheduler
                .schedule_fallible_job(
                    move || {
                        if fails {
                            anyhow::bail!("job {index} failed on purpose");
                        }
                        Ok(())
                    },
                    &dep_ids,
                    0,
                )
                .expect("dependencies are registered");
            ids.push(id);
        }
        scheduler.wait_for_all();

        // A job is expected to fail iff it fails itself or any (transitive)
        // dependency does.
        let mut tainted = vec![false; dag.len()];
        for (index, deps) in dag.iter().enumerate() {
            tainted[index] = failing.contains(&index) || deps.iter().any(|&d| tainted[d]);
        }

        for (index, id) in ids.iter().enumerate() {
            let outcome = scheduler.wait_for_job(*id).expect("known job");
            prop_assert_eq!(!outcome.is_completed(), tainted[index], "job {}: {}", index, outcome);
        }
    }
}
