//! Updater configuration file management.
//!
//! The configuration file tells the update manager where its collaborators
//! live (backend, release-metadata host, bundle server), how patient to be with
//! them, and how to hand a package to the platform installer.
//!
//! # Configuration File Location
//!
//! - **Unix/macOS**: `~/.updatectl/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\updatectl\config.toml`
//!
//! The location can be overridden with the `UPDATECTL_CONFIG_PATH` environment
//! variable. The CLI's `--config` flag takes precedence over both.
//!
//! # File Format
//!
//! Every key is optional; missing keys take their defaults.
//!
//! ```toml
//! backend_url = "https://api.gigmarket.app/api"
//! fallback_download_url = "https://github.com/gigmarket/app/releases/latest"
//! metadata_api_host = "api.github.com"
//! platform = "android"
//! config_timeout_secs = 10
//! metadata_timeout_secs = 10
//! max_resume_attempts = 3
//!
//! [bundle]
//! enabled = true
//! server_url = "https://updates.gigmarket.app/manifest"
//!
//! [installer]
//! authority = "com.gigmarket.app.fileprovider"
//! launcher = "am"
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use updatectl::config::UpdaterConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load().await?;
//! println!("Policy endpoint: {}", config.policy_endpoint());
//! # Ok(())
//! # }
//! ```

use crate::constants::{
    CONFIG_FETCH_TIMEOUT, DEFAULT_MAX_RESUME_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS,
    METADATA_FETCH_TIMEOUT,
};
use crate::upgrade::platform::Platform;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "UPDATECTL_CONFIG_PATH";

/// Top-level updater configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Backend base URL; the policy lives at `<backend_url>/mobile/config`.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Release-listing page used when the policy cannot be fetched or
    /// carries no download URL.
    #[serde(default = "default_fallback_download_url")]
    pub fallback_download_url: String,

    /// Host the release page is rewritten to for metadata lookups.
    ///
    /// May include a scheme (`http://127.0.0.1:8080`); otherwise the release
    /// page's scheme is reused.
    #[serde(default = "default_metadata_api_host")]
    pub metadata_api_host: String,

    /// Runtime platform. Detected from the build target when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    /// Platform whose native package is distributed.
    #[serde(default = "default_package_platform")]
    pub package_platform: Platform,

    /// Installed version override. The embedded build version is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,

    /// Directory for package download sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,

    #[serde(default = "default_config_timeout_secs")]
    pub config_timeout_secs: u64,

    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,

    /// How many times an interrupted transfer is resumed before giving up.
    #[serde(default = "default_max_resume_attempts")]
    pub max_resume_attempts: u32,

    /// Interval between checks for `updatectl watch`.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub bundle: BundleConfig,

    #[serde(default)]
    pub installer: InstallerConfig,
}

/// Bundle (interpreted-code) update channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Whether the channel is active. Development builds disable it.
    #[serde(default = "default_bundle_enabled")]
    pub enabled: bool,

    /// Manifest endpoint. Without it the channel never reports an update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// Runtime version bundles must target. Defaults to the installed version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,

    /// Where fetched bundles are stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Platform installer hand-off settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Content-provider authority exposing the download directory.
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Activity-manager executable that receives the install intent.
    #[serde(default = "default_launcher")]
    pub launcher: String,
}

fn default_backend_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_fallback_download_url() -> String {
    "https://github.com/gigmarket/app/releases/latest".to_string()
}

fn default_metadata_api_host() -> String {
    "api.github.com".to_string()
}

const fn default_package_platform() -> Platform {
    Platform::Android
}

const fn default_config_timeout_secs() -> u64 {
    CONFIG_FETCH_TIMEOUT.as_secs()
}

const fn default_metadata_timeout_secs() -> u64 {
    METADATA_FETCH_TIMEOUT.as_secs()
}

const fn default_max_resume_attempts() -> u32 {
    DEFAULT_MAX_RESUME_ATTEMPTS
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_bundle_enabled() -> bool {
    !cfg!(debug_assertions)
}

fn default_authority() -> String {
    "com.gigmarket.app.fileprovider".to_string()
}

fn default_launcher() -> String {
    "am".to_string()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            fallback_download_url: default_fallback_download_url(),
            metadata_api_host: default_metadata_api_host(),
            platform: None,
            package_platform: default_package_platform(),
            installed_version: None,
            download_dir: None,
            config_timeout_secs: default_config_timeout_secs(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            max_resume_attempts: default_max_resume_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            bundle: BundleConfig::default(),
            installer: InstallerConfig::default(),
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            enabled: default_bundle_enabled(),
            server_url: None,
            runtime_version: None,
            dir: None,
        }
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            launcher: default_launcher(),
        }
    }
}

impl UpdaterConfig {
    /// Load from the default location, or defaults when no file exists.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path` when given, otherwise from the default location.
    ///
    /// A missing file yields the default configuration in both cases.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load_from(&path).await,
            Some(_) => Ok(Self::default()),
            None => Self::load().await,
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))
    }

    /// Save to the default location.
    pub async fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path).await
    }

    /// Save as pretty TOML, creating parent directories as needed.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize updater config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write updater config to {}", path.display()))?;

        Ok(())
    }

    /// Configuration file location, honoring `UPDATECTL_CONFIG_PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("updatectl")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".updatectl")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Full URL of the version-policy endpoint.
    pub fn policy_endpoint(&self) -> String {
        format!("{}/mobile/config", self.backend_url.trim_end_matches('/'))
    }

    /// Configured platform, or the build target's.
    pub fn effective_platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }

    /// Download directory, defaulting to `<tmp>/updatectl`.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| std::env::temp_dir().join("updatectl"))
    }

    /// Bundle directory, defaulting to `<local data>/updatectl/bundles`.
    pub fn bundle_dir(&self) -> PathBuf {
        self.bundle.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("updatectl")
                .join("bundles")
        })
    }

    pub const fn config_timeout(&self) -> Duration {
        Duration::from_secs(self.config_timeout_secs)
    }

    pub const fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
