//! Remote version policy and the client that fetches it.
//!
//! The backend publishes a single policy document:
//!
//! ```text
//! GET <backend>/mobile/config
//! {
//!   "version": {
//!     "min_version": "1.8.0",
//!     "current_version": "1.9.0",
//!     "force_update": true,
//!     "download_url": "https://github.com/gigmarket/app/releases/latest"
//!   }
//! }
//! ```
//!
//! The endpoint needs no authentication and is idempotent, so it is safe to
//! query on every foreground. A failed fetch is never fatal: callers fall back
//! to [`VersionPolicy::fallback`].

use crate::constants::{UNKNOWN_VERSION, user_agent};
use crate::core::UpdateError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Version policy snapshot from the backend.
///
/// Immutable per fetch; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPolicy {
    /// Oldest version allowed to keep running.
    #[serde(default = "unknown_version")]
    pub min_version: String,
    /// Latest published version.
    #[serde(default = "unknown_version")]
    pub current_version: String,
    /// Whether being below `min_version` blocks the app.
    #[serde(default)]
    pub force_update: bool,
    /// Where the latest native package can be obtained.
    #[serde(default)]
    pub download_url: String,
}

fn unknown_version() -> String {
    UNKNOWN_VERSION.to_string()
}

impl VersionPolicy {
    /// Policy applied when the backend cannot be reached.
    ///
    /// `force_update` is on, but with a minimum of `0.0.0` no install is ever
    /// below it, so the app is not blocked by an outage alone.
    pub fn fallback(download_url: impl Into<String>) -> Self {
        Self {
            min_version: UNKNOWN_VERSION.to_string(),
            current_version: UNKNOWN_VERSION.to_string(),
            force_update: true,
            download_url: download_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MobileConfigResponse {
    version: VersionPolicy,
}

/// Fetches the [`VersionPolicy`] from the backend.
#[derive(Debug, Clone)]
pub struct ConfigClient {
    client: Client,
    endpoint: String,
    fallback_download_url: String,
    timeout: Duration,
}

impl ConfigClient {
    /// Create a client for `endpoint` (the full `/mobile/config` URL).
    ///
    /// `fallback_download_url` fills in a policy that arrives without a
    /// download URL.
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        fallback_download_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            fallback_download_url: fallback_download_url.into(),
            timeout,
        }
    }

    /// Fetch the current policy with a single bounded request.
    ///
    /// # Errors
    ///
    /// [`UpdateError::ConfigFetch`] on transport failure, timeout, non-success
    /// status, or a body that is not a policy document.
    pub async fn fetch(&self) -> Result<VersionPolicy, UpdateError> {
        debug!("Fetching version policy from {}", self.endpoint);

        let fail = |reason: String| UpdateError::ConfigFetch {
            url: self.endpoint.clone(),
            reason,
        };

        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::USER_AGENT, user_agent())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fail(format!("timed out after {}s", self.timeout.as_secs()))
                } else {
                    fail(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let body = response.text().await.map_err(|e| fail(e.to_string()))?;
        let parsed: MobileConfigResponse = serde_json::from_str(&body)
            .map_err(|e| fail(format!("malformed policy document: {e}")))?;

        let mut policy = parsed.version;
        if policy.download_url.trim().is_empty() {
            policy.download_url = self.fallback_download_url.clone();
        }

        info!(
            "Version policy: min={} current={} force={}",
            policy.min_version, policy.current_version, policy.force_update
        );
        Ok(policy)
    }
}
