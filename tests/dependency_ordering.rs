// tests/dependency_ordering.rs

mod common;
use crate::common::{LONG, TestResult, init_tracing, park_workers};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use jobgraph::errors::JobgraphError;
use jobgraph::{JobOutcome, JobScheduler, JobState};
use jobgraph_test_utils::gate::Gate;
use jobgraph_test_utils::recorder::ExecutionLog;

#[test]
fn dependent_sees_side_effect_of_dependency() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(4)?;
    let flag = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(AtomicBool::new(false));

    let a_flag = Arc::clone(&flag);
    let a = scheduler.schedule_job(
        move || {
            thread::sleep(Duration::from_millis(20));
            a_flag.store(true, Ordering::SeqCst);
        },
        0,
    );

    let b_flag = Arc::clone(&flag);
    let b_observed = Arc::clone(&observed);
    let b = scheduler.schedule_job_with_deps(
        move || b_observed.store(b_flag.load(Ordering::SeqCst), Ordering::SeqCst),
        &[a],
        // More urgent than A, but must still wait for it.
        -100,
    )?;

    assert_eq!(scheduler.wait_for_job(b)?, JobOutcome::Completed);
    assert!(observed.load(Ordering::SeqCst), "B ran before A finished");
    Ok(())
}

#[test]
fn diamond_waits_for_both_branches() -> TestResult {
    init_tracing();

    for _ in 0..20 {
        let scheduler = JobScheduler::with_workers(4)?;
        let log = ExecutionLog::new();

        let a = scheduler.schedule_job(log.recorder("A"), 0);
        let l = log.clone();
        let b = scheduler.schedule_job_with_deps(
            move || {
                thread::sleep(Duration::from_millis(2));
                l.record("B");
            },
            &[a],
            0,
        )?;
        let c = scheduler.schedule_job_with_deps(log.recorder("C"), &[a], 0)?;

        let l = log.clone();
        let d = scheduler.schedule_job_with_deps(
            move || {
                let seen = l.entries();
                assert!(seen.contains(&"B") && seen.contains(&"C"), "D ran early: {seen:?}");
                l.record("D");
            },
            &[b, c],
            0,
        )?;

        assert_eq!(scheduler.wait_for_job(d)?, JobOutcome::Completed);
        log.assert_before(&"A", &"B");
        log.assert_before(&"A", &"C");
        log.assert_before(&"B", &"D");
        log.assert_before(&"C", &"D");
    }
    Ok(())
}

#[test]
fn dependency_already_completed_does_not_block() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(1)?;
    let a = scheduler.schedule_job(|| {}, 0);
    scheduler.wait_for_job(a)?;

    let b = scheduler.schedule_job_with_deps(|| {}, &[a], 0)?;
    assert_eq!(scheduler.wait_for_job(b)?, JobOutcome::Completed);
    Ok(())
}

#[test]
fn blocked_job_is_not_queued_until_dependencies_finish() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(2)?;
    let gate = Gate::new();
    let parked = park_workers(&scheduler, &gate, 1);

    let dependent = scheduler.schedule_job_with_deps(|| {}, &[parked[0]], 0)?;
    assert_eq!(scheduler.job_state(dependent), Some(JobState::Blocked));
    assert_eq!(scheduler.dependencies_of(dependent), Some(vec![parked[0]]));

    gate.open();
    assert_eq!(scheduler.wait_for_job(dependent)?, JobOutcome::Completed);
    Ok(())
}

#[test]
fn unknown_dependency_is_rejected_without_registering() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(1)?;
    let a = scheduler.schedule_job(|| {}, 0);

    let err = scheduler
        .schedule_job_with_deps(|| panic!("must never run"), &[a, 42], 0)
        .unwrap_err();
    assert!(matches!(err, JobgraphError::UnknownDependency(42)), "got {err:?}");

    // The rejected submission did not consume an id.
    let b = scheduler.schedule_job(|| {}, 0);
    assert_eq!(b, a + 1);

    scheduler.wait_for_all();
    assert_eq!(scheduler.stats().completed, 2);
    Ok(())
}

#[test]
fn duplicate_dependencies_count_once() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(2)?;
    let a = scheduler.schedule_job(|| thread::sleep(Duration::from_millis(5)), 0);
    let b = scheduler.schedule_job_with_deps(|| {}, &[a, a, a], 0)?;

    assert_eq!(scheduler.wait_for_job(b)?, JobOutcome::Completed);
    Ok(())
}

#[test]
fn add_dependency_delays_a_blocked_job() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(2)?;
    let gate = Gate::new();
    let parked = park_workers(&scheduler, &gate, 1);
    let log = ExecutionLog::new();

    let dependent = scheduler.schedule_job_with_deps(log.recorder("dependent"), &[parked[0]], 0)?;

    let release = Gate::new();
    let r = release.clone();
    let l = log.clone();
    let extra = scheduler.schedule_job(
        move || {
            r.wait();
            l.record("extra");
        },
        0,
    );
    scheduler.add_dependency(dependent, extra)?;

    // The original dependency finishing is no longer enough.
    gate.open();
    scheduler.wait_for_job(parked[0])?;
    assert_eq!(scheduler.wait_for_job_timeout(dependent, Duration::from_millis(50))?, None);

    release.open();
    assert_eq!(scheduler.wait_for_job(dependent)?, JobOutcome::Completed);
    log.assert_before(&"extra", &"dependent");
    Ok(())
}

#[test]
fn add_dependency_never_misses_a_concurrent_completion() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(4)?;

    for _ in 0..100 {
        let gate = Gate::new();
        let log = ExecutionLog::new();

        let g = gate.clone();
        let hold = scheduler.schedule_job(move || g.wait(), 0);
        let dependent = scheduler.schedule_job_with_deps(log.recorder("dependent"), &[hold], 0)?;
        // Races with the add_dependency call below.
        let racing = scheduler.schedule_job(log.recorder("racing"), 0);

        scheduler.add_dependency(dependent, racing)?;
        gate.open();

        assert_eq!(scheduler.wait_for_job(dependent)?, JobOutcome::Completed);
        log.assert_before(&"racing", &"dependent");
    }
    Ok(())
}

#[test]
fn add_dependency_on_completed_job_is_satisfied() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(2)?;
    let done = scheduler.schedule_job(|| {}, 0);
    scheduler.wait_for_job(done)?;

    let gate = Gate::new();
    let parked = park_workers(&scheduler, &gate, 1);
    let dependent = scheduler.schedule_job_with_deps(|| {}, &[parked[0]], 0)?;
    scheduler.add_dependency(dependent, done)?;

    gate.open();
    assert_eq!(scheduler.wait_for_job(dependent)?, JobOutcome::Completed);
    let mut deps = scheduler.dependencies_of(dependent).expect("known job");
    deps.sort_unstable();
    assert_eq!(deps, vec![done, parked[0]]);
    Ok(())
}

#[test]
fn add_dependency_rejects_invalid_edges() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(2)?;
    let gate = Gate::new();
    let parked = park_workers(&scheduler, &gate, 1);

    let a = scheduler.schedule_job_with_deps(|| {}, &[parked[0]], 0)?;
    let b = scheduler.schedule_job_with_deps(|| {}, &[a], 0)?;

    assert!(matches!(
        scheduler.add_dependency(a, b),
        Err(JobgraphError::DependencyCycle { dependent, dependency }) if dependent == a && dependency == b
    ));
    assert!(matches!(
        scheduler.add_dependency(a, a),
        Err(JobgraphError::SelfDependency(id)) if id == a
    ));
    assert!(matches!(
        scheduler.add_dependency(999, a),
        Err(JobgraphError::UnknownJob(999))
    ));
    assert!(matches!(
        scheduler.add_dependency(a, 999),
        Err(JobgraphError::UnknownDependency(999))
    ));
    // The parked job is running; it can no longer gain dependencies.
    assert!(matches!(
        scheduler.add_dependency(parked[0], a),
        Err(JobgraphError::AlreadyDispatched(id)) if id == parked[0]
    ));
    // Re-adding an existing edge is a no-op.
    scheduler.add_dependency(b, a)?;

    gate.open();
    assert!(scheduler.wait_for_all_timeout(LONG));
    assert_eq!(scheduler.wait_for_job(b)?, JobOutcome::Completed);
    Ok(())
}

#[test]
fn add_dependency_pulls_a_queued_job_back() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(1)?;
    let gate = Gate::new();
    park_workers(&scheduler, &gate, 1);

    let log = ExecutionLog::new();
    let first = scheduler.schedule_job(log.recorder("first"), 5);
    // More urgent, so it would run first without the extra edge.
    let second = scheduler.schedule_job(log.recorder("second"), 0);
    assert_eq!(scheduler.job_state(second), Some(JobState::Queued));

    scheduler.add_dependency(second, first)?;
    assert_eq!(scheduler.job_state(second), Some(JobState::Blocked));
    assert_eq!(scheduler.dependencies_of(second), Some(vec![first]));

    gate.open();
    assert_eq!(scheduler.wait_for_job(second)?, JobOutcome::Completed);
    assert_eq!(log.entries(), vec!["first", "second"]);
    Ok(())
}

#[test]
fn queued_job_given_a_failed_dependency_never_runs() -> TestResult {
    init_tracing();

    let scheduler = JobScheduler::with_workers(1)?;
    let broken = scheduler.schedule_job(|| panic!("broken"), 0);
    scheduler.wait_for_job(broken)?;

    let gate = Gate::new();
    park_workers(&scheduler, &gate, 1);
    let log = ExecutionLog::new();
    let queued = scheduler.schedule_job(log.recorder("queued"), 0);

    scheduler.add_dependency(queued, broken)?;
    assert!(matches!(
        scheduler.job_state(queued),
        Some(JobState::Finished(JobOutcome::Failed { .. }))
    ));

    gate.open();
    scheduler.wait_for_all();
    assert!(log.is_empty());
    assert_eq!(scheduler.stats().queued, 0);
    Ok(())
}
