#![allow(dead_code)]

use std::collections::BTreeMap;

use jobgraph::config::{GraphFile, JobConfig, RawGraphFile, SchedulerSection};
use jobgraph::errors::Result;
use jobgraph::types::{FailurePolicy, Priority};

/// Builder for `GraphFile` to simplify test setup.
pub struct GraphFileBuilder {
    graph: RawGraphFile,
}

impl GraphFileBuilder {
    pub fn new() -> Self {
        Self {
            graph: RawGraphFile {
                scheduler: SchedulerSection::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.graph.job.insert(name.to_string(), job);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.graph.scheduler.workers = Some(workers);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.graph.scheduler.failure_policy = policy;
        self
    }

    /// Validate without panicking, for tests that expect an error.
    pub fn try_build(self) -> Result<GraphFile> {
        GraphFile::try_from(self.graph)
    }

    pub fn build(self) -> GraphFile {
        self.try_build()
            .expect("Failed to build valid job graph from builder")
    }
}

impl Default for GraphFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            job: JobConfig {
                cmd: cmd.to_string(),
                priority: 0,
                after: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.job.after.push(dep.to_string());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
