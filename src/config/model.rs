// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::engine::SchedulerOptions;
use crate::types::{FailurePolicy, Priority};

/// Job graph file as read from TOML, before validation.
///
/// ```toml
/// [scheduler]
/// workers = 4
/// failure_policy = "propagate"
///
/// [job.fetch]
/// cmd = "echo fetch"
///
/// [job.build]
/// cmd = "echo build"
/// priority = -1
/// after = ["fetch"]
/// ```
///
/// All sections are optional at parse time; validation requires at least
/// one job.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGraphFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// All jobs from `[job.<name>]`, keyed by job name.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// A validated job graph file.
///
/// Only constructible through `TryFrom<RawGraphFile>` (see
/// `config::validate`), so holders can rely on every `after` entry naming a
/// known job and on the graph being acyclic.
#[derive(Debug, Clone)]
pub struct GraphFile {
    pub scheduler: SchedulerSection,
    pub job: BTreeMap<String, JobConfig>,
}

impl GraphFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        job: BTreeMap<String, JobConfig>,
    ) -> Self {
        Self { scheduler, job }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerSection {
    /// Worker thread count; defaults to the available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    /// `"propagate"` (default) or `"continue"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl SchedulerSection {
    pub fn to_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            worker_count: self.workers,
            failure_policy: self.failure_policy,
            ..SchedulerOptions::default()
        }
    }
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// The command to execute.
    pub cmd: String,

    /// Lower values run first among ready jobs.
    #[serde(default)]
    pub priority: Priority,

    /// Jobs that must complete before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
}
