//! Configuration management for updatectl
//!
//! A single TOML file configures the update manager. Everything in it is
//! optional and defaults to values that work against the production backend.
//!
//! # Modules
//!
//! - `global` - [`UpdaterConfig`] and its load/save helpers
//!
//! # Configuration Priority
//!
//! 1. The `--config` flag, or the `UPDATECTL_CONFIG_PATH` environment variable
//! 2. `~/.updatectl/config.toml` (`%LOCALAPPDATA%\updatectl\config.toml` on Windows)
//! 3. Built-in defaults
//!
//! Nothing the update manager learns at runtime is written back: version
//! policy and update state live only for the lifetime of the process.

mod global;

pub use global::{BundleConfig, CONFIG_PATH_ENV, InstallerConfig, UpdaterConfig};
