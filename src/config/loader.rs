// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::Result;

/// Read and deserialize a job graph file without semantic checks.
///
/// Missing sections and fields get their serde defaults here; dependency
/// names and cycles are only checked by [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let raw: RawGraphFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), jobs = raw.job.len(), "job graph file parsed");
    Ok(raw)
}

/// Read a job graph file and validate it into a [`GraphFile`].
///
/// Rejects files with no jobs, `workers = 0`, empty commands, unknown or
/// self-referencing `after` entries and dependency cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphFile> {
    GraphFile::try_from(load_from_path(path)?)
}

/// `Jobgraph.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Jobgraph.toml")
}
