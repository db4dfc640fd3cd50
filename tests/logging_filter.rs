// tests/logging_filter.rs

use tracing::level_filters::LevelFilter;

use jobgraph::cli::LogLevel;
use jobgraph::logging::build_filter;

#[test]
fn cli_level_overrides_environment() {
    let filter = build_filter(Some(LogLevel::Warn), Some("trace"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
}

#[test]
fn environment_directives_are_used() {
    let filter = build_filter(None, Some("jobgraph::engine=trace"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
}

#[test]
fn missing_or_blank_environment_defaults_to_info() {
    assert_eq!(build_filter(None, None).max_level_hint(), Some(LevelFilter::INFO));
    assert_eq!(
        build_filter(None, Some("   ")).max_level_hint(),
        Some(LevelFilter::INFO)
    );
}
