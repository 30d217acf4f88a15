//! Native package channel commands.
//!
//! - `download` - Download the package named by the version policy
//! - `install <file>` - Hand a package file to the platform installer
//! - `upgrade` - Download, then install
//!
//! The installer is launched, not awaited: success means the platform's
//! install screen was opened. Installation itself is confirmed by the user.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::common::{CommandContext, CommandExecutor, print_success, print_warning};
use crate::upgrade::InstallOutcome;
use crate::utils::ensure_dir;

/// Download the latest package without installing it.
#[derive(Args, Debug, Default)]
pub struct DownloadCommand {
    /// Remove leftover package files from earlier downloads first
    #[arg(long)]
    clean: bool,
}

impl CommandExecutor for DownloadCommand {
    async fn execute_with_context(self, context: &CommandContext) -> Result<i32> {
        if self.clean {
            clean_stale(context).await;
        }

        context.orchestrator.check_for_updates().await;
        let file = context.download_with_progress().await?;
        print_success(&format!("Package saved to {}", file.display()));
        println!("Run '{} {}' to install it.", "updatectl install".bold(), file.display());
        Ok(0)
    }
}

/// Launch the platform installer for a package file.
#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Package file to install
    file: PathBuf,
}

impl InstallCommand {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
        }
    }
}

impl CommandExecutor for InstallCommand {
    async fn execute_with_context(self, context: &CommandContext) -> Result<i32> {
        let shared = stage_for_install(&self.file, context.orchestrator.download_dir()).await?;
        let outcome = context.orchestrator.install_package(Some(&shared)).await?;
        report_launch(&outcome);
        Ok(0)
    }
}

/// Download the latest package and launch the installer.
#[derive(Args, Debug, Default)]
pub struct UpgradeCommand {
    /// Download and install even when already up to date
    #[arg(long)]
    force: bool,
}

impl CommandExecutor for UpgradeCommand {
    async fn execute_with_context(self, context: &CommandContext) -> Result<i32> {
        let orchestrator = &context.orchestrator;
        orchestrator.check_for_updates().await;

        let state = orchestrator.state();
        if let Some(error) = state.error() {
            print_warning(error);
        }
        if !self.force && !state.update_available() && !state.update_required() {
            print_success(&format!(
                "Already up to date ({})",
                state.gating().installed_version()
            ));
            return Ok(0);
        }

        let file = context.download_with_progress().await?;
        let outcome = orchestrator.install_package(Some(&file)).await?;
        report_launch(&outcome);
        Ok(0)
    }
}

/// Copy `file` into the shared download directory unless it is already there.
///
/// The installer can only be granted access to files inside that directory.
async fn stage_for_install(file: &Path, shared_dir: &Path) -> Result<PathBuf> {
    let file = tokio::fs::canonicalize(file)
        .await
        .with_context(|| format!("Package file not found: {}", file.display()))?;

    ensure_dir(shared_dir).await?;
    let shared_dir = tokio::fs::canonicalize(shared_dir).await?;
    if file.starts_with(&shared_dir) {
        return Ok(file);
    }

    let name = file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Not a file: {}", file.display()))?;
    let target = shared_dir.join(name);
    tokio::fs::copy(&file, &target).await.with_context(|| {
        format!("Failed to copy {} into {}", file.display(), shared_dir.display())
    })?;
    Ok(target)
}

async fn clean_stale(context: &CommandContext) {
    match context.orchestrator.cleanup_stale_downloads().await {
        Ok(removed) if !removed.is_empty() => {
            println!("Removed {} stale download(s)", removed.len());
        }
        Ok(_) => {}
        Err(e) => print_warning(&format!("Could not clean download directory: {e:#}")),
    }
}

fn report_launch(outcome: &InstallOutcome) {
    let InstallOutcome::Launched {
        uri,
    } = outcome;
    print_success(&format!("Installer launched for {uri}"));
    println!("Confirm the installation on the device to finish updating.");
}
