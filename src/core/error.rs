//! Error handling for updatectl
//!
//! The update manager has two audiences for its errors: the orchestrator, which
//! must turn every failure into a state update and keep running, and the CLI
//! user, who needs to know what to do next. The error system reflects that:
//!
//! - [`UpdateError`] - One variant per failure point of the update pipeline
//! - [`ErrorContext`] - Wrapper adding user-facing details and a suggestion
//! - [`user_friendly_error`] - Map any [`anyhow::Error`] into an [`ErrorContext`]
//!
//! # Error Taxonomy
//!
//! | Variant | Channel | Surfaced | Retryable |
//! |---------|---------|----------|-----------|
//! | [`UpdateError::ConfigFetch`] | gating | `state.error` only | yes |
//! | [`UpdateError::ArtifactResolution`] | package | never (degrades) | - |
//! | [`UpdateError::Download`] | package | `download.error` | yes |
//! | [`UpdateError::DownloadCancelled`] | package | `download.error` | yes |
//! | [`UpdateError::PlatformUnsupported`] | package | `download.error` | no |
//! | [`UpdateError::InstallerLaunch`] | package | `download.error` | after remediation |
//! | [`UpdateError::OtaFetch`] / [`UpdateError::OtaApply`] | bundle | `ota.error` | yes |
//!
//! # Examples
//!
//! ```rust,no_run
//! use updatectl::core::{UpdateError, user_friendly_error};
//!
//! let err = UpdateError::InstallerLaunch {
//!     reason: "activity manager not found".to_string(),
//! };
//! assert!(!err.is_retryable());
//!
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display(); // error + details + suggestion, colored
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The update channel an error belongs to.
///
/// Errors never cross channels: a bundle failure must not touch the package
/// sub-state and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorChannel {
    /// Startup policy fetch and gating decision.
    Gating,
    /// Native package download and install.
    Package,
    /// Interpreted-code bundle updates.
    Bundle,
    /// Local configuration and I/O outside any channel.
    Local,
}

/// The main error type for update operations.
///
/// Every variant carries owned strings so errors can be cloned into state
/// snapshots and across task boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// The version-policy endpoint could not be reached or returned garbage.
    ///
    /// Recovered by applying default policy values; surfaced only through
    /// `state.error`.
    #[error("Failed to fetch version policy from {url}: {reason}")]
    ConfigFetch {
        /// Endpoint that was queried
        url: String,
        /// Transport, status or parse failure description
        reason: String,
    },

    /// The release-listing URL could not be resolved to an artifact.
    ///
    /// Internal only: the resolver degrades to the original URL and logs this.
    #[error("Could not resolve release artifact from {url}: {reason}")]
    ArtifactResolution {
        /// Release-listing URL that was being resolved
        url: String,
        /// Why resolution did not produce an artifact URL
        reason: String,
    },

    /// The package transfer failed or produced no file.
    #[error("Download failed: {reason}")]
    Download {
        /// Transport or file-system failure description
        reason: String,
    },

    /// The user cancelled an in-flight package transfer.
    #[error("Download cancelled")]
    DownloadCancelled,

    /// The package format does not match the runtime platform.
    #[error("Package updates for {package_platform} are not supported on {platform}")]
    PlatformUnsupported {
        /// Platform the process is running on
        platform: String,
        /// Platform the package artifact targets
        package_platform: String,
    },

    /// The platform installer could not be started.
    ///
    /// Failure to launch, not failure to install: the OS owns the install UX.
    #[error("Could not launch the package installer: {reason}")]
    InstallerLaunch {
        /// Launch failure description
        reason: String,
    },

    /// Checking or fetching a bundle update failed.
    #[error("Bundle update check failed: {reason}")]
    OtaFetch {
        /// Failure description
        reason: String,
    },

    /// Applying a fetched bundle failed; no reload was attempted.
    #[error("Bundle update could not be applied: {reason}")]
    OtaApply {
        /// Failure description
        reason: String,
    },

    /// Local configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// File system operation failed.
    #[error("File system error during {operation}: {reason}")]
    Io {
        /// Operation being performed (e.g., "create download file")
        operation: String,
        /// Underlying error text
        reason: String,
    },
}

impl UpdateError {
    /// Wrap an I/O error with the operation that produced it.
    pub fn io(operation: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            reason: err.to_string(),
        }
    }

    /// Whether repeating the same action can reasonably succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConfigFetch { .. }
            | Self::Download { .. }
            | Self::DownloadCancelled
            | Self::OtaFetch { .. }
            | Self::OtaApply { .. }
            | Self::Io { .. } => true,
            Self::ArtifactResolution { .. }
            | Self::PlatformUnsupported { .. }
            | Self::InstallerLaunch { .. }
            | Self::Config { .. } => false,
        }
    }

    /// The channel whose sub-state records this error.
    pub const fn channel(&self) -> ErrorChannel {
        match self {
            Self::ConfigFetch { .. } => ErrorChannel::Gating,
            Self::ArtifactResolution { .. }
            | Self::Download { .. }
            | Self::DownloadCancelled
            | Self::PlatformUnsupported { .. }
            | Self::InstallerLaunch { .. } => ErrorChannel::Package,
            Self::OtaFetch { .. } | Self::OtaApply { .. } => ErrorChannel::Bundle,
            Self::Config { .. } | Self::Io { .. } => ErrorChannel::Local,
        }
    }
}

/// Error with user-facing context for CLI display.
///
/// Pairs an [`UpdateError`] with optional details (what happened) and a
/// suggestion (what to do about it).
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdateError,
    /// Actionable next step for the user
    pub suggestion: Option<String>,
    /// Extra explanation of the failure
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no details or suggestion.
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with a tailored suggestion.
///
/// [`UpdateError`]s anywhere in the chain get variant-specific remediation;
/// I/O and TOML errors are mapped onto their closest variant; everything else
/// becomes a generic configuration error carrying the full cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.chain().find_map(|e| e.downcast_ref::<UpdateError>()) {
        return create_error_context(update_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        let ctx = ErrorContext::new(UpdateError::io("file access", io_error));
        return match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => ctx
                .with_suggestion("Check that the download directory is writable by the current user")
                .with_details("updatectl does not have permission to read or write a file it needs"),
            std::io::ErrorKind::NotFound => ctx
                .with_suggestion("Check that the file or directory exists and the path is correct"),
            _ => ctx,
        };
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(UpdateError::Config {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your updatectl config file, or run 'updatectl config init' to start over")
        .with_details("The configuration file exists but could not be parsed");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpdateError::Config {
        message,
    })
}

fn create_error_context(error: UpdateError) -> ErrorContext {
    match &error {
        UpdateError::ConfigFetch { .. } => ErrorContext::new(error)
            .with_suggestion("Check your network connection and retry. The app stays usable while the server is unreachable")
            .with_details("The update server could not be reached, so default update rules were applied"),

        UpdateError::ArtifactResolution { .. } => ErrorContext::new(error)
            .with_details("The release page will be downloaded directly instead"),

        UpdateError::Download { .. } => ErrorContext::new(error)
            .with_suggestion("Retry the download. Progress made so far is shown so you can judge how far it got")
            .with_details("The package transfer was interrupted or the server did not return a file"),

        UpdateError::DownloadCancelled => ErrorContext::new(error)
            .with_suggestion("Start the download again when you are ready"),

        UpdateError::PlatformUnsupported { .. } => ErrorContext::new(error)
            .with_suggestion("Update through your platform's app store instead")
            .with_details("Native package downloads are only available on the platform the package targets"),

        UpdateError::InstallerLaunch { .. } => ErrorContext::new(error)
            .with_suggestion("Enable installs from unknown sources for this app (Settings > Apps > Special access > Install unknown apps), then retry the install")
            .with_details("The package was downloaded but the system installer could not be opened"),

        UpdateError::OtaFetch { .. } | UpdateError::OtaApply { .. } => ErrorContext::new(error)
            .with_suggestion("Bundle updates are retried on next launch. No action is required")
            .with_details("The app keeps running its current code"),

        UpdateError::Config { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'updatectl config show' to inspect the effective configuration"),

        UpdateError::Io { .. } => ErrorContext::new(error)
            .with_suggestion("Check free disk space and permissions of the download directory"),
    }
}
