// src/dag/mod.rs

//! Job graph representation and bookkeeping.
//!
//! - [`graph`] holds the dependency edges between submitted jobs.
//! - [`job`] provides the per-job record and the ready-job hand-off type.
//! - [`registry`] contains the single-threaded state machine that decides
//!   which jobs are ready, and what happens to dependents when a job
//!   finishes.

pub mod graph;
pub mod job;
pub mod registry;

pub use graph::DependencyGraph;
pub use job::{JobRecord, JobTask, ReadyJob};
pub use registry::{CompletionStep, JobRegistry, StateCounts, Submission};
