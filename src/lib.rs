//! updatectl - Application self-update manager
//!
//! Keeps an installed Gigmarket app current. A server-side version policy
//! decides whether the install may keep running; two independent channels
//! deliver updates:
//!
//! - the **bundle channel** replaces interpreted application code in place and
//!   restarts the process on it
//! - the **native package channel** downloads a full package and hands it to the
//!   platform installer
//!
//! # Architecture Overview
//!
//! The [`upgrade::UpdateOrchestrator`] owns a single published
//! [`upgrade::UpdateState`]. Each channel writes only its own part of that
//! state, so the channels can run concurrently without corrupting each
//! other, and a failure in one never blocks the other or the gating decision.
//!
//! ## Key Features
//!
//! - **Version gating**: minimum/latest version policy with a force flag
//! - **Fail-open on outages**: an unreachable backend never blocks the app by
//!   itself, but a forced update confirmed earlier in the process stays forced
//! - **Release resolution**: release-listing pages are resolved to the package
//!   asset, degrading to the page URL when the metadata API is unavailable
//! - **Resumable downloads**: `Range` resume with backoff, progress reporting,
//!   cancellation
//! - **Observable state**: every change is published on a watch channel
//!
//! # Core Modules
//!
//! - [`cli`] - Command-line interface
//! - [`config`] - Updater configuration (`~/.updatectl/config.toml`)
//! - [`constants`] - Timeouts, retry parameters and package format identifiers
//! - [`core`] - Error types and user-facing error formatting
//! - [`upgrade`] - The update manager components
//! - [`utils`] - Backoff, download file handling and progress display
//! - [`version`] - Version comparison and installed-version detection
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Run the startup check (exit status 2 when the app must be blocked)
//! updatectl status
//! updatectl status --json
//!
//! # Native package channel
//! updatectl download
//! updatectl install /path/to/app.apk
//! updatectl upgrade
//!
//! # Bundle channel
//! updatectl ota check
//! updatectl ota apply
//!
//! # Re-check periodically and report gating changes
//! updatectl watch
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod upgrade;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
