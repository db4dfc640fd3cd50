// src/config/validate.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{GraphFile, JobConfig, RawGraphFile};
use crate::errors::{JobgraphError, Result};

impl TryFrom<RawGraphFile> for GraphFile {
    type Error = JobgraphError;

    fn try_from(raw: RawGraphFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(GraphFile::new_unchecked(raw.scheduler, raw.job))
    }
}

/// Run every check on a raw job graph file.
pub fn validate_config(cfg: &RawGraphFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_scheduler_section(cfg)?;
    validate_job_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawGraphFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(JobgraphError::ConfigError(
            "job graph must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(cfg: &RawGraphFile) -> Result<()> {
    // failure_policy is strongly typed and validated during deserialization.
    if cfg.scheduler.workers == Some(0) {
        return Err(JobgraphError::ConfigError(
            "[scheduler].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_job_dependencies(cfg: &RawGraphFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        if job.cmd.trim().is_empty() {
            return Err(JobgraphError::ConfigError(format!(
                "job '{}' has an empty `cmd`",
                name
            )));
        }
        for dep in job.after.iter() {
            if !cfg.job.contains_key(dep) {
                return Err(JobgraphError::ConfigError(format!(
                    "job '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(JobgraphError::ConfigError(format!(
                    "job '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawGraphFile) -> Result<()> {
    topological_names(&cfg.job).map(|_| ())
}

/// Job names in an order where every job comes after all of its `after`
/// entries, i.e. an order in which they can be submitted to the scheduler.
pub fn submission_order(cfg: &GraphFile) -> Vec<String> {
    // A validated file is acyclic, so this cannot fail.
    topological_names(&cfg.job).unwrap_or_default()
}

fn topological_names(jobs: &BTreeMap<String, JobConfig>) -> Result<Vec<String>> {
    // Edge direction: dep -> job
    // For:
    //   [job.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in jobs.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in jobs.iter() {
        for dep in job.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(JobgraphError::DagCycle(format!(
                "cycle detected in job graph involving job '{}'",
                node
            )))
        }
    }
}
