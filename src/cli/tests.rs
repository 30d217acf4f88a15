//! Argument parsing and configuration building tests for the CLI.

use super::{Cli, CliConfig, Commands};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn test_cli_parsing() {
    assert!(Cli::try_parse_from(["updatectl", "--help"]).is_err());
    assert!(Cli::try_parse_from(["updatectl"]).is_err());
    assert!(Cli::try_parse_from(["updatectl", "status"]).is_ok());
    assert!(Cli::try_parse_from(["updatectl", "frobnicate"]).is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["updatectl", "status", "--verbose", "--no-progress"]).unwrap();
    assert!(cli.verbose);
    assert!(cli.no_progress);
}

#[test]
fn test_verbose_conflicts_with_quiet() {
    assert!(Cli::try_parse_from(["updatectl", "-v", "-q", "status"]).is_err());
}

#[test]
fn test_build_config_log_levels() {
    let cli = Cli::try_parse_from(["updatectl", "status"]).unwrap();
    assert_eq!(cli.build_config().log_level.as_deref(), Some("info"));

    let cli = Cli::try_parse_from(["updatectl", "--verbose", "status"]).unwrap();
    assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));

    let cli = Cli::try_parse_from(["updatectl", "--quiet", "status"]).unwrap();
    assert_eq!(cli.build_config().log_level, None);
}

#[test]
fn test_build_config_carries_path_and_progress() {
    let cli = Cli::try_parse_from([
        "updatectl",
        "--config",
        "/tmp/updatectl-test.toml",
        "--no-progress",
        "download",
    ])
    .unwrap();
    let config = cli.build_config();
    assert_eq!(config.config_path, Some(PathBuf::from("/tmp/updatectl-test.toml")));
    assert!(config.no_progress);
}

#[test]
fn test_cli_config_default() {
    let config = CliConfig::new();
    assert_eq!(config.log_level, None);
    assert!(!config.no_progress);
    assert_eq!(config.config_path, None);
}

#[test]
fn test_subcommands_parse() {
    let cli = Cli::try_parse_from(["updatectl", "status", "--json"]).unwrap();
    assert!(matches!(cli.command, Commands::Status(_)));

    let cli = Cli::try_parse_from(["updatectl", "ota", "apply"]).unwrap();
    assert!(matches!(cli.command, Commands::Ota(_)));
    assert!(Cli::try_parse_from(["updatectl", "ota"]).is_err());

    let cli = Cli::try_parse_from(["updatectl", "install", "app.apk"]).unwrap();
    assert!(matches!(cli.command, Commands::Install(_)));
    assert!(Cli::try_parse_from(["updatectl", "install"]).is_err());

    let cli = Cli::try_parse_from(["updatectl", "watch", "--interval", "30", "--count", "2"]).unwrap();
    assert!(matches!(cli.command, Commands::Watch(_)));

    let cli = Cli::try_parse_from(["updatectl", "config"]).unwrap();
    assert!(matches!(cli.command, Commands::Config(_)));
}

#[test]
fn test_config_command_debug_output() {
    let cli = Cli::try_parse_from(["updatectl", "config", "init", "--force"]).unwrap();
    let rendered = format!("{:?}", cli.command);
    assert!(rendered.contains("Config"));
    assert!(rendered.contains("Init"));
    assert!(rendered.contains("force: true"));
}
