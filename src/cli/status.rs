//! Run the startup check and report the gating decision.
//!
//! Exit status is 0 unless the install is force-blocked, in which case it is
//! [`FORCE_BLOCKED_EXIT_CODE`], so launch scripts can gate on it:
//!
//! ```bash
//! updatectl status || echo "update required"
//! updatectl status --json | jq .forceUpdate
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, CommandExecutor};
use crate::upgrade::{GateDecision, UpdateState};
use crate::utils::ProgressBar;

/// Exit status when the installed version must not keep running.
pub const FORCE_BLOCKED_EXIT_CODE: i32 = 2;

/// Command to run the startup check.
#[derive(Args, Debug, Default)]
pub struct StatusCommand {
    /// Print the full state as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

impl StatusCommand {
    pub const fn new(json: bool) -> Self {
        Self {
            json,
        }
    }
}

impl CommandExecutor for StatusCommand {
    async fn execute_with_context(self, context: &CommandContext) -> Result<i32> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Checking for updates");
        let decision = context.orchestrator.check_for_updates().await;
        spinner.finish_and_clear();
        let state = context.orchestrator.state();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&state)?);
        } else {
            print!("{}", render_summary(&state, context.config.bundle.enabled));
        }

        Ok(exit_code(decision))
    }
}

pub const fn exit_code(decision: GateDecision) -> i32 {
    if decision.is_blocking() {
        FORCE_BLOCKED_EXIT_CODE
    } else {
        0
    }
}

/// Human-readable label for a decision.
pub fn decision_label(decision: Option<GateDecision>) -> String {
    match decision {
        Some(GateDecision::UpToDate) => "up to date".green().to_string(),
        Some(GateDecision::UpdateAvailable) => "update available".cyan().to_string(),
        Some(GateDecision::UpdateRequiredSoft) => "update required".yellow().to_string(),
        Some(GateDecision::UpdateRequiredForced) => {
            "update required (blocking)".red().bold().to_string()
        }
        None => "unknown".dimmed().to_string(),
    }
}

pub(crate) fn render_summary(state: &UpdateState, bundle_enabled: bool) -> String {
    let gating = state.gating();
    let mut out = String::new();

    out.push_str(&format!("{:<18} {}\n", "Installed version:", gating.installed_version()));
    out.push_str(&format!("{:<18} {}\n", "Latest version:", gating.current_version()));
    out.push_str(&format!("{:<18} {}\n", "Status:", decision_label(gating.decision())));
    if gating.update_available() || gating.update_required() {
        out.push_str(&format!("{:<18} {}\n", "Download:", gating.download_url()));
    }

    let ota = state.ota();
    let bundle = if !bundle_enabled {
        "disabled".dimmed().to_string()
    } else if let Some(manifest) = ota.manifest() {
        format!("available ({})", manifest.id).cyan().to_string()
    } else if let Some(error) = ota.error() {
        format!("check failed: {error}").yellow().to_string()
    } else {
        "none".to_string()
    };
    out.push_str(&format!("{:<18} {}\n", "Bundle update:", bundle));

    if let Some(error) = gating.error() {
        out.push_str(&format!(
            "\n{} {}\n  Default update rules were applied.\n",
            "warning:".yellow().bold(),
            error
        ));
    }
    if gating.force_update() {
        out.push_str(&format!("\nRun '{}' to install the required version.\n", "updatectl upgrade".bold()));
    }
    out
}
