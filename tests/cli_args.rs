// tests/cli_args.rs

use std::path::PathBuf;

use clap::Parser;

use jobgraph::FailurePolicy;
use jobgraph::cli::CliArgs;

#[test]
fn defaults_when_no_flags_are_given() {
    let args = CliArgs::try_parse_from(["jobgraph"]).expect("parse");
    assert_eq!(args.config, PathBuf::from("Jobgraph.toml"));
    assert_eq!(args.workers, None);
    assert_eq!(args.failure_policy, None);
    assert!(args.log_level.is_none());
    assert!(!args.dry_run);
}

#[test]
fn overrides_are_parsed() {
    let args = CliArgs::try_parse_from([
        "jobgraph",
        "--config",
        "ci/graph.toml",
        "--workers",
        "3",
        "--failure-policy",
        "continue",
        "--log-level",
        "debug",
        "--dry-run",
    ])
    .expect("parse");

    assert_eq!(args.config, PathBuf::from("ci/graph.toml"));
    assert_eq!(args.workers, Some(3));
    assert_eq!(args.failure_policy, Some(FailurePolicy::Continue));
    assert!(args.dry_run);
}

#[test]
fn zero_workers_and_unknown_policy_are_rejected() {
    assert!(CliArgs::try_parse_from(["jobgraph", "--workers", "0"]).is_err());
    assert!(CliArgs::try_parse_from(["jobgraph", "--failure-policy", "retry"]).is_err());
}
