// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::JobId;

#[derive(Error, Debug)]
pub enum JobgraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in job graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Job not found: {0}")]
    UnknownJob(JobId),

    #[error("Unknown dependency: job {0} was never submitted or has been cleared")]
    UnknownDependency(JobId),

    #[error("Job {0} cannot depend on itself")]
    SelfDependency(JobId),

    #[error("Adding dependency {dependency} to job {dependent} would create a cycle")]
    DependencyCycle { dependent: JobId, dependency: JobId },

    #[error("Job {0} has already been dispatched; its dependencies can no longer change")]
    AlreadyDispatched(JobId),

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JobgraphError>;
