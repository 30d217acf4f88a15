//! Manage the updater configuration file.
//!
//! # Commands
//!
//! - `init` - Write a configuration file with every default spelled out
//! - `show` - Print the effective configuration (the default)
//! - `path` - Print where the configuration file lives
//!
//! # Examples
//!
//! ```bash
//! updatectl config init
//! updatectl config init --force
//! updatectl config show
//! updatectl --config ./staging.toml config show
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::UpdaterConfig;

/// Command to manage the updater configuration.
///
/// With no subcommand, shows the effective configuration.
#[derive(Debug, Args)]
pub struct ConfigCommand {
    /// Configuration operation to perform
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommands {
    /// Create a configuration file populated with the defaults.
    ///
    /// Refuses to overwrite an existing file unless `--force` is given.
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Display the effective configuration.
    ///
    /// Missing keys are shown with their default values.
    Show,

    /// Display the path of the configuration file.
    Path,
}

impl ConfigCommand {
    /// Run the selected operation against `config_path`, or the default location.
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        match self.command {
            Some(ConfigSubcommands::Init { force }) => Self::init(force, config_path).await,
            Some(ConfigSubcommands::Show) | None => Self::show(config_path).await,
            Some(ConfigSubcommands::Path) => Self::show_path(config_path),
        }
    }

    fn resolve_path(config_path: Option<PathBuf>) -> Result<PathBuf> {
        match config_path {
            Some(path) => Ok(path),
            None => UpdaterConfig::default_path(),
        }
    }

    async fn init(force: bool, config_path: Option<PathBuf>) -> Result<()> {
        let config_path = Self::resolve_path(config_path)?;

        if config_path.exists() && !force {
            println!("❌ Config already exists at: {}", config_path.display());
            println!("   Use --force to overwrite");
            return Ok(());
        }

        let config = UpdaterConfig::default();
        config.save_to(&config_path).await?;

        println!("✅ Created config at: {}", config_path.display());
        println!("\n{}", "Configuration:".bold());
        println!("{}", toml::to_string_pretty(&config)?);
        println!("\n{}", "Next steps:".yellow());
        println!("  1. Point backend_url at your API server");
        println!("  2. Set bundle.server_url to enable bundle updates");

        Ok(())
    }

    async fn show(config_path: Option<PathBuf>) -> Result<()> {
        let location = Self::resolve_path(config_path.clone())?;
        let config = UpdaterConfig::load_with_optional(Some(location.clone())).await?;

        println!("{}", "Updater Configuration".bold());
        if location.exists() {
            println!("Location: {}\n", location.display());
        } else {
            println!("Location: {} {}\n", location.display(), "(not created, showing defaults)".dimmed());
        }
        println!("{}", toml::to_string_pretty(&config)?);
        println!("{} {}", "Policy endpoint:".cyan(), config.policy_endpoint());
        println!("{} {}", "Platform:".cyan(), config.effective_platform());
        println!("{} {}", "Download directory:".cyan(), config.download_dir().display());

        Ok(())
    }

    fn show_path(config_path: Option<PathBuf>) -> Result<()> {
        let config_path = Self::resolve_path(config_path)?;
        println!("{}", config_path.display());
        Ok(())
    }
}
