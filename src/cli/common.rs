//! Common utilities and traits for CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::UpdaterConfig;
use crate::core::UpdateError;
use crate::upgrade::UpdateOrchestrator;
use crate::utils::ProgressBar;

/// Common trait for commands that drive the update orchestrator
pub trait CommandExecutor: Sized {
    /// Execute the command, loading configuration from `config_path`
    /// or the default location.
    ///
    /// Returns the process exit status.
    fn execute(
        self,
        config_path: Option<PathBuf>,
    ) -> impl std::future::Future<Output = Result<i32>> + Send
    where
        Self: Send,
    {
        async move {
            let context = CommandContext::load(config_path).await?;
            self.execute_with_context(&context).await
        }
    }

    /// Execute the command against a prepared context
    fn execute_with_context(
        self,
        context: &CommandContext,
    ) -> impl std::future::Future<Output = Result<i32>> + Send;
}

/// Loaded configuration plus the orchestrator built from it
#[derive(Debug)]
pub struct CommandContext {
    /// Effective updater configuration
    pub config: UpdaterConfig,
    /// Orchestrator wired with production seams
    pub orchestrator: UpdateOrchestrator,
}

impl CommandContext {
    /// Load configuration and build the orchestrator
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = UpdaterConfig::load_with_optional(config_path)
            .await
            .context("Failed to load updater configuration")?;
        Self::from_config(config)
    }

    /// Build a context from an in-memory configuration
    pub fn from_config(config: UpdaterConfig) -> Result<Self> {
        let orchestrator = UpdateOrchestrator::from_config(&config)?;
        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// Download the policy's package with a progress bar.
    ///
    /// Ctrl-C cancels the transfer; the partial file is removed.
    pub async fn download_with_progress(&self) -> Result<PathBuf, UpdateError> {
        let progress = ProgressBar::new_bytes(0);
        progress.set_message("Downloading package");

        let mut updates = self.orchestrator.subscribe();
        let display = progress.clone();
        let tracker = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let download = updates.borrow_and_update().download().clone();
                display.set_length(download.total_bytes());
                display.set_position(download.bytes_downloaded());
            }
        });

        let download = self.orchestrator.download_package();
        tokio::pin!(download);
        let result = tokio::select! {
            result = &mut download => result,
            _ = tokio::signal::ctrl_c() => {
                self.orchestrator.cancel_download();
                download.await
            }
        };
        tracker.abort();

        match &result {
            Ok(file) => progress.finish_with_message(format!("Downloaded {}", file.display())),
            Err(UpdateError::DownloadCancelled) => progress.abandon_with_message("Download cancelled"),
            Err(_) => {
                let percent = self.orchestrator.state().download().progress();
                progress.abandon_with_message(format!("Download failed at {percent}%"));
            }
        }
        result
    }
}

/// Print a one-line success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print a one-line warning to stderr
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}
