//! Progress indicators for long-running update operations
//!
//! Thin wrappers over `indicatif` with updatectl styling. Two shapes are used:
//! a byte-oriented bar for package downloads and a spinner for requests whose
//! duration is unknown (policy fetch, bundle check).
//!
//! # Environment Variables
//!
//! - `UPDATECTL_NO_PROGRESS`: Set to any value to hide all progress indicators
//!
//! # Examples
//!
//! ```rust
//! use updatectl::utils::progress::ProgressBar;
//!
//! let bar = ProgressBar::new_bytes(2_000_000);
//! bar.set_message("Downloading package");
//! bar.set_position(500_000);
//! bar.finish_with_message("Downloaded");
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Environment variable that hides progress indicators.
pub const NO_PROGRESS_ENV: &str = "UPDATECTL_NO_PROGRESS";

/// Checks if progress indicators should be hidden.
///
/// True when `UPDATECTL_NO_PROGRESS` is set to any value. The CLI sets it for
/// `--no-progress`.
pub fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// A progress indicator with updatectl styling.
///
/// Cloning is cheap and clones share the same terminal line, so a clone can be
/// moved into a progress callback while the caller keeps the original.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Create a bar measuring bytes out of `len`.
    ///
    /// A `len` of `0` means the size is unknown; the bar then shows a byte
    /// counter without an ETA until [`set_length`](Self::set_length) is called.
    pub fn new_bytes(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(bytes_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Create a spinner for work of unknown duration.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn set_length(&self, len: u64) {
        self.inner.set_length(len);
    }

    pub fn set_position(&self, pos: u64) {
        self.inner.set_position(pos);
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Stop the bar where it is, keeping the last position visible.
    pub fn abandon_with_message(&self, msg: impl Into<String>) {
        self.inner.abandon_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn bytes_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {percent}% ({eta})")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
