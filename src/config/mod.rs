// src/config/mod.rs

//! Job graph file loading and validation for the `jobgraph` front end.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a job graph file from disk (`loader.rs`).
//! - Validate basic invariants like DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{GraphFile, JobConfig, RawGraphFile, SchedulerSection};
pub use validate::{submission_order, validate_config};
