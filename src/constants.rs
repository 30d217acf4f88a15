//! Global constants used throughout the updatectl codebase.
//!
//! This module contains timeout durations, retry parameters, and the package
//! format identifiers that are shared by several update components. Keeping
//! them together makes the numbers discoverable and easy to tune.

use std::time::Duration;

/// Timeout for the version-policy fetch (10 seconds).
///
/// The startup gating decision waits on this request, so it must be bounded.
pub const CONFIG_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for release-metadata resolution (10 seconds).
///
/// On expiry the resolver degrades to the original URL exactly as it does for
/// any other failure.
pub const METADATA_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum backoff delay between resume attempts (2 seconds).
pub const MAX_BACKOFF_DELAY_MS: u64 = 2_000;

/// Starting delay for exponential backoff (250ms).
///
/// Doubles on each retry attempt up to [`MAX_BACKOFF_DELAY_MS`].
pub const STARTING_BACKOFF_DELAY_MS: u64 = 250;

/// Default number of times an interrupted package transfer is resumed.
pub const DEFAULT_MAX_RESUME_ATTEMPTS: u32 = 3;

/// Default interval for the `watch` command (5 minutes).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Version reported when the installed version cannot be determined.
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// File extension of Android application packages.
pub const APK_EXTENSION: &str = ".apk";

/// MIME type the Android package installer registers for.
pub const APK_MIME_TYPE: &str = "application/vnd.android.package-archive";

/// `Accept` header required by the release-metadata API.
pub const METADATA_ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

/// Prefix of every package download session file.
///
/// Stale-file cleanup only ever touches files carrying this prefix.
pub const DOWNLOAD_FILE_PREFIX: &str = "app-update-";

/// User agent sent with every outbound request.
pub fn user_agent() -> String {
    format!("updatectl/{}", env!("CARGO_PKG_VERSION"))
}
