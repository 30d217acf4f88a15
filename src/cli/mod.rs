//! Command-line interface for updatectl.
//!
//! Each command lives in its own module with its own argument structure and
//! runs against a [`common::CommandContext`]: the loaded
//! [`UpdaterConfig`](crate::config::UpdaterConfig) plus an
//! [`UpdateOrchestrator`](crate::upgrade::UpdateOrchestrator) built from it.
//!
//! # Available Commands
//!
//! ## Checking
//! - `status` - Run the startup check and report the gating decision
//! - `watch` - Re-run the check on an interval
//!
//! ## Native package channel
//! - `download` - Download the latest package
//! - `install <file>` - Launch the platform installer for a package
//! - `upgrade` - Download and install
//!
//! ## Bundle channel
//! - `ota check` / `ota apply` - Check for or apply a bundle update
//!
//! ## System
//! - `config` - Show or initialize the configuration file
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug logging
//! - `--quiet` - Disable logging (errors are still printed)
//! - `--no-progress` - Disable progress bars and spinners
//! - `--config` - Path to a configuration file
//!
//! # Exit Status
//!
//! `0` on success, `1` on error, and `2` from `status` when the installed
//! version is force-blocked.
//!
//! ```bash
//! updatectl status
//! updatectl --verbose upgrade
//! updatectl --config ./staging.toml ota check
//! ```

pub mod common;
mod config;
mod ota;
mod package;
mod status;
mod watch;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use self::common::CommandExecutor;
use crate::utils::progress::NO_PROGRESS_ENV;

pub use status::FORCE_BLOCKED_EXIT_CODE;

/// Runtime configuration for CLI execution.
///
/// Holds what would otherwise be read from process-wide flags, so tests and
/// embedders can drive [`Cli::execute_with_config`] directly.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log level for the `updatectl` target. `None` disables logging unless
    /// `RUST_LOG` is set.
    pub log_level: Option<String>,

    /// Disable progress bars and spinners.
    pub no_progress: bool,

    /// Custom configuration file path.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply this configuration to the process environment.
    ///
    /// Sets `UPDATECTL_NO_PROGRESS` when progress output is disabled. Must be
    /// called before any worker threads read the environment.
    pub fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: called once from `execute_with_config`, before commands spawn tasks.
            unsafe {
                std::env::set_var(NO_PROGRESS_ENV, "1");
            }
        }
    }

    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` wins over the CLI flags. Logs go to stderr so command
    /// output on stdout stays parseable. A subscriber installed earlier (by a
    /// test harness, for instance) is left in place.
    pub fn init_logging(&self) {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => match &self.log_level {
                Some(level) => EnvFilter::new(format!("updatectl={level}")),
                None => return,
            },
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Self-update manager for the installed app.
#[derive(Parser, Debug)]
#[command(
    name = "updatectl",
    about = "Check for, download and install app updates",
    version,
    long_about = "updatectl compares the installed version against the backend version policy, \
                  downloads and launches native packages, and applies over-the-air bundle updates."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress log output; errors are still reported
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "UPDATECTL_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Disable progress bars and spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the startup check and report whether an update is needed.
    ///
    /// Exits with status 2 when the installed version is force-blocked.
    Status(status::StatusCommand),

    /// Check for or apply an over-the-air bundle update.
    Ota(ota::OtaCommand),

    /// Download the package for the latest version.
    Download(package::DownloadCommand),

    /// Launch the platform installer for a downloaded package.
    Install(package::InstallCommand),

    /// Download the latest package and launch the installer.
    Upgrade(package::UpgradeCommand),

    /// Re-check for updates periodically and report changes.
    Watch(watch::WatchCommand),

    /// Show or initialize the configuration file.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Execute the parsed command and return the process exit status.
    pub async fn execute(self) -> Result<i32> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Build a [`CliConfig`] from the parsed arguments.
    ///
    /// ```rust,ignore
    /// let cli = Cli::parse_from(["updatectl", "--verbose", "status"]);
    /// assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));
    /// ```
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<i32> {
        config.apply_to_env();
        config.init_logging();

        let path = config.config_path;
        match self.command {
            Commands::Status(cmd) => cmd.execute(path).await,
            Commands::Ota(cmd) => cmd.execute(path).await,
            Commands::Download(cmd) => cmd.execute(path).await,
            Commands::Install(cmd) => cmd.execute(path).await,
            Commands::Upgrade(cmd) => cmd.execute(path).await,
            Commands::Watch(cmd) => cmd.execute(path).await,
            Commands::Config(cmd) => cmd.execute(path).await.map(|()| 0),
        }
    }
}
