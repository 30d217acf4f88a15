//! Shared utilities
//!
//! # Modules
//!
//! - [`backoff`] - Exponential backoff for resumable transfers
//! - [`fs`] - Download session file naming and stale-file cleanup
//! - [`progress`] - Progress bars and spinners for CLI output

pub mod backoff;
pub mod fs;
pub mod progress;

pub use fs::{cleanup_stale_downloads, ensure_dir, session_file_path};
pub use progress::ProgressBar;
