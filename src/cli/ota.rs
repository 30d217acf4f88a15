//! Bundle channel commands.
//!
//! ```bash
//! updatectl ota check     # Is a newer bundle published for this runtime?
//! updatectl ota apply     # Fetch it and restart on it
//! ```
//!
//! Both are no-ops when the channel is disabled (`bundle.enabled = false`,
//! the default for development builds).

use anyhow::Result;
use clap::{Args, Subcommand};

use super::common::{CommandContext, CommandExecutor, print_success, print_warning};

/// Command to check for or apply bundle updates.
#[derive(Args, Debug)]
pub struct OtaCommand {
    #[command(subcommand)]
    command: OtaSubcommands,
}

#[derive(Subcommand, Debug)]
enum OtaSubcommands {
    /// Check whether a bundle update is available
    Check,
    /// Fetch the available bundle and restart on it
    Apply,
}

impl CommandExecutor for OtaCommand {
    async fn execute_with_context(self, context: &CommandContext) -> Result<i32> {
        if !context.config.bundle.enabled {
            println!("Bundle updates are disabled in this configuration.");
            return Ok(0);
        }

        let orchestrator = &context.orchestrator;
        match self.command {
            OtaSubcommands::Check => {
                if orchestrator.check_for_ota_update().await {
                    let state = orchestrator.state();
                    let id = state.ota().manifest().map(|m| m.id.as_str()).unwrap_or_default();
                    println!("Bundle update available: {id}");
                } else if let Some(error) = orchestrator.state().ota().error() {
                    print_warning(error);
                    return Ok(1);
                } else {
                    print_success("Bundle is up to date");
                }
                Ok(0)
            }
            OtaSubcommands::Apply => {
                if orchestrator.apply_ota_update().await {
                    return Ok(0);
                }
                let state = orchestrator.state();
                match state.ota().error() {
                    Some(error) => {
                        print_warning(error);
                        println!("The app keeps running its current code.");
                        Ok(1)
                    }
                    None => {
                        print_success("No bundle update to apply");
                        Ok(0)
                    }
                }
            }
        }
    }
}
