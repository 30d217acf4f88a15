//! Re-run the startup check periodically and report gating changes.
//!
//! Runs until interrupted with Ctrl-C. Only changes are printed, so the
//! output doubles as a log of policy transitions.

use anyhow::Result;
use clap::Args;
use std::time::Duration;
use tracing::debug;

use super::common::{CommandContext, CommandExecutor, print_warning};
use super::status::decision_label;
use crate::upgrade::GateDecision;

/// Command to re-check for updates on an interval.
#[derive(Args, Debug, Default)]
pub struct WatchCommand {
    /// Seconds between checks (defaults to `poll_interval_secs`)
    #[arg(long, short)]
    interval: Option<u64>,

    /// Stop after this many checks
    #[arg(long)]
    count: Option<u32>,
}

impl CommandExecutor for WatchCommand {
    async fn execute_with_context(self, context: &CommandContext) -> Result<i32> {
        let period = self
            .interval
            .map_or_else(|| context.config.poll_interval(), Duration::from_secs)
            .max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);

        let mut last: Option<GateDecision> = None;
        let mut checks = 0u32;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => break,
            }

            let decision = context.orchestrator.check_for_updates().await;
            checks += 1;

            let state = context.orchestrator.state();
            if last != Some(decision) {
                println!(
                    "[{}] {} (installed {}, latest {})",
                    chrono::Local::now().format("%H:%M:%S"),
                    decision_label(Some(decision)),
                    state.gating().installed_version(),
                    state.gating().current_version()
                );
                last = Some(decision);
            } else {
                debug!("No change: {:?}", decision);
            }
            if let Some(error) = state.error() {
                print_warning(error);
            }

            if self.count.is_some_and(|n| checks >= n) {
                break;
            }
        }
        Ok(0)
    }
}
