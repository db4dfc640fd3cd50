// src/logging.rs

//! `tracing` subscriber setup for the `jobgraph` binary.
//!
//! The filter comes from, in order:
//! 1. `--log-level` (applies to every target)
//! 2. `JOBGRAPH_LOG`, any `EnvFilter` directive string such as
//!    `"debug"` or `"jobgraph::engine=trace,info"`
//! 3. `info`
//!
//! Output goes to stderr; stdout belongs to the jobs.

use anyhow::{Result, anyhow};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable consulted when no CLI level is given.
pub const LOG_ENV: &str = "JOBGRAPH_LOG";

/// Install the global subscriber. Errors if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Resolve the effective filter. Unparsable env directives fall back to
/// `info` rather than silencing everything.
pub fn build_filter(cli_level: Option<LogLevel>, env_directives: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(LevelFilter::from(level).to_string());
    }

    env_directives
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(LevelFilter::INFO.to_string()))
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}
