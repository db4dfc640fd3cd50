// src/exec/mod.rs

//! Job execution layer.
//!
//! - [`worker`] owns the worker thread loop: it pulls ready jobs, runs them
//!   with panics contained, and reports outcomes back to the scheduler.
//! - [`command`] turns a shell command line into a job body, used by the
//!   `jobgraph` command-line front end.

pub mod command;
pub mod worker;

pub use command::shell_task;
