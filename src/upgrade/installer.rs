//! Hand-off of a downloaded package to the platform installer.
//!
//! The platform installer runs in another process and cannot read the app's
//! private files by path. The package is therefore exposed through a
//! `content://` URI owned by the app's file provider, and the install intent
//! grants the installer read permission on that URI.
//!
//! Launching is fire-and-forget. [`InstallOutcome::Launched`] means the
//! installer was started, never that the package was installed: the OS owns
//! the install UX from that point and reports nothing back.

use crate::core::UpdateError;
use crate::upgrade::platform::PackageFormat;
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tracing::{debug, info};

/// Intent action that opens the package installer.
pub const ACTION_VIEW: &str = "android.intent.action.VIEW";

/// Lets the receiving activity read the intent's data URI.
pub const FLAG_GRANT_READ_URI_PERMISSION: u32 = 0x0000_0001;

/// Starts the installer as a new task, outside the app's back stack.
pub const FLAG_ACTIVITY_NEW_TASK: u32 = 0x1000_0000;

/// Path segment under which the file provider shares downloaded packages.
const SHARED_SEGMENT: &str = "updates";

/// A `content://` handle to a shared file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUri(Url);

impl ContentUri {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Maps files inside one shared directory to content URIs.
#[derive(Debug, Clone)]
pub struct ContentUriProvider {
    authority: String,
    root: PathBuf,
}

impl ContentUriProvider {
    pub fn new(authority: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            authority: authority.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content URI for `file`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Io`] when `file` does not exist
    /// - [`UpdateError::Config`] when `file` is outside the shared directory or
    ///   the authority is not a valid URI host
    pub async fn uri_for(&self, file: &Path) -> Result<ContentUri, UpdateError> {
        let file = tokio::fs::canonicalize(file)
            .await
            .map_err(|e| UpdateError::io(format!("locate package {}", file.display()), &e))?;
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| UpdateError::io("locate shared download directory", &e))?;

        if !file.starts_with(&root) {
            return Err(UpdateError::Config {
                message: format!(
                    "{} is not inside the shared download directory {}",
                    file.display(),
                    root.display()
                ),
            });
        }

        let name = file.file_name().and_then(|n| n.to_str()).ok_or_else(|| UpdateError::Config {
            message: format!("{} has no usable file name", file.display()),
        })?;

        let invalid_authority = || UpdateError::Config {
            message: format!("invalid file provider authority '{}'", self.authority),
        };
        let mut url =
            Url::parse(&format!("content://{}", self.authority)).map_err(|_| invalid_authority())?;
        url.path_segments_mut().map_err(|()| invalid_authority())?.clear().extend([SHARED_SEGMENT, name]);

        Ok(ContentUri(url))
    }
}

/// A single-shot install request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallIntent {
    pub action: &'static str,
    pub data: ContentUri,
    pub mime_type: &'static str,
    pub flags: u32,
}

impl InstallIntent {
    /// View intent for `data`, readable by the receiver, in a new task.
    pub const fn install(data: ContentUri, mime_type: &'static str) -> Self {
        Self {
            action: ACTION_VIEW,
            data,
            mime_type,
            flags: FLAG_GRANT_READ_URI_PERMISSION | FLAG_ACTIVITY_NEW_TASK,
        }
    }
}

/// Something that can deliver an intent to the platform.
pub trait IntentLauncher: Send + Sync {
    /// Start the intent's target and return without waiting for it.
    ///
    /// # Errors
    ///
    /// [`UpdateError::InstallerLaunch`] when the target could not be started.
    fn launch(&self, intent: &InstallIntent) -> Result<(), UpdateError>;
}

/// Delivers intents through the activity manager command-line tool.
#[derive(Debug, Clone)]
pub struct ActivityManagerLauncher {
    program: String,
}

impl ActivityManagerLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(intent: &InstallIntent) -> Vec<String> {
        vec![
            "start".to_string(),
            "-a".to_string(),
            intent.action.to_string(),
            "-d".to_string(),
            intent.data.to_string(),
            "-t".to_string(),
            intent.mime_type.to_string(),
            "-f".to_string(),
            format!("{:#010x}", intent.flags),
            "--grant-read-uri-permission".to_string(),
        ]
    }
}

impl IntentLauncher for ActivityManagerLauncher {
    fn launch(&self, intent: &InstallIntent) -> Result<(), UpdateError> {
        let program = which::which(&self.program).map_err(|e| UpdateError::InstallerLaunch {
            reason: format!("'{}' not found: {e}", self.program),
        })?;

        debug!("Launching {} {:?}", program.display(), Self::args(intent));

        // The child is not awaited; the runtime reaps it when it exits
        tokio::process::Command::new(&program)
            .args(Self::args(intent))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| UpdateError::InstallerLaunch {
                reason: format!("failed to start {}: {e}", program.display()),
            })?;

        Ok(())
    }
}

/// Result of [`PackageInstaller::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The installer was started with this URI. Terminal for the update
    /// manager; install success is not observable.
    Launched { uri: ContentUri },
}

/// Hands downloaded packages to the platform installer.
#[derive(Clone)]
pub struct PackageInstaller {
    uris: ContentUriProvider,
    format: PackageFormat,
    launcher: Arc<dyn IntentLauncher>,
}

impl fmt::Debug for PackageInstaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageInstaller")
            .field("uris", &self.uris)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl PackageInstaller {
    pub fn new(
        uris: ContentUriProvider,
        format: PackageFormat,
        launcher: Arc<dyn IntentLauncher>,
    ) -> Self {
        Self {
            uris,
            format,
            launcher,
        }
    }

    pub fn shared_dir(&self) -> &Path {
        self.uris.root()
    }

    /// Launch the installer for `package`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Io`] / [`UpdateError::Config`] when the file cannot be
    ///   shared
    /// - [`UpdateError::InstallerLaunch`] when the installer cannot be started
    pub async fn install(&self, package: &Path) -> Result<InstallOutcome, UpdateError> {
        let uri = self.uris.uri_for(package).await?;
        let intent = InstallIntent::install(uri.clone(), self.format.mime_type);

        self.launcher.launch(&intent)?;
        info!("Package installer launched for {}", uri);
        Ok(InstallOutcome::Launched { uri })
    }
}
