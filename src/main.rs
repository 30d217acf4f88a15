//! updatectl CLI entry point
//!
//! Parses arguments, runs the selected command and renders failures with
//! details and a suggested next step.
//!
//! - `status` - Run the startup check and print the gating decision
//! - `download` / `install` / `upgrade` - Native package channel
//! - `ota check` / `ota apply` - Bundle channel
//! - `watch` - Periodic re-check
//! - `config` - Manage the updater configuration

use clap::Parser;
use updatectl::cli;
use updatectl::core::user_friendly_error;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
