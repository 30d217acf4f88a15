//! Resolution of release-listing pages into downloadable artifacts.
//!
//! The policy's `download_url` is often a human-facing page such as
//! `https://github.com/org/app/releases/latest`. The resolver rewrites it to
//! the release-metadata API (`https://api.github.com/repos/org/app/releases/latest`),
//! reads the asset list, and picks the first asset that is a native package.
//!
//! Resolution is advisory. Every failure (network error, timeout, non-200,
//! unrecognized page, no matching asset) degrades to returning the input URL
//! unchanged, and the download itself reports whatever goes wrong next.
//! [`ReleaseArtifactResolver::try_resolve`] exposes the typed
//! [`ResolutionWarning`] for callers and tests that want to see why.

use crate::constants::{METADATA_ACCEPT_HEADER, user_agent};
use crate::core::UpdateError;
use crate::upgrade::platform::PackageFormat;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Why a release page could not be resolved to an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    /// The URL is not of the form `<host>/<owner>/<repo>/releases[/...]`.
    NotAReleasePage,
    /// The metadata request failed in transport.
    Network(String),
    /// The metadata request exceeded its time budget.
    Timeout,
    /// The metadata API answered with a non-success status.
    Status(u16),
    /// The metadata body was not an asset list.
    Parse(String),
    /// No asset matched the package format.
    NoMatchingAsset,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAReleasePage => f.write_str("not a release listing URL"),
            Self::Network(e) => write!(f, "network error: {e}"),
            Self::Timeout => f.write_str("metadata request timed out"),
            Self::Status(code) => write!(f, "metadata API returned HTTP {code}"),
            Self::Parse(e) => write!(f, "unexpected metadata format: {e}"),
            Self::NoMatchingAsset => f.write_str("release has no matching package asset"),
        }
    }
}

impl ResolutionWarning {
    /// Convert into the crate error for logging or display.
    pub fn into_error(self, url: &str) -> UpdateError {
        UpdateError::ArtifactResolution {
            url: url.to_string(),
            reason: self.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseMetadata {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    #[serde(default)]
    content_type: String,
    browser_download_url: String,
}

/// Resolves release-listing URLs into direct artifact URLs.
#[derive(Debug, Clone)]
pub struct ReleaseArtifactResolver {
    client: Client,
    format: PackageFormat,
    metadata_host: String,
    timeout: Duration,
}

impl ReleaseArtifactResolver {
    /// Create a resolver.
    ///
    /// `metadata_host` is either a bare host (`api.github.com`), in which case
    /// the release page's scheme is reused, or a base URL with a scheme.
    pub fn new(
        client: Client,
        format: PackageFormat,
        metadata_host: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            format,
            metadata_host: metadata_host.into(),
            timeout,
        }
    }

    /// Resolve `url` to a downloadable artifact URL, never failing.
    ///
    /// URLs that already name a package are returned as-is without any
    /// network access, so `resolve(resolve(x)) == resolve(x)` for them.
    pub async fn resolve(&self, url: &str) -> String {
        match self.try_resolve(url).await {
            Ok(resolved) => resolved,
            Err(warning) => {
                warn!("{}; downloading the original URL", warning.into_error(url));
                url.to_string()
            }
        }
    }

    /// Resolve `url`, reporting why resolution failed.
    pub async fn try_resolve(&self, url: &str) -> Result<String, ResolutionWarning> {
        if self.format.matches_name(url) {
            debug!("{} already names a package, skipping resolution", url);
            return Ok(url.to_string());
        }

        let api_url = self.metadata_url(url).ok_or(ResolutionWarning::NotAReleasePage)?;
        debug!("Resolving {} via {}", url, api_url);

        let response = self
            .client
            .get(api_url)
            .header(reqwest::header::ACCEPT, METADATA_ACCEPT_HEADER)
            .header(reqwest::header::USER_AGENT, user_agent())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResolutionWarning::Timeout
                } else {
                    ResolutionWarning::Network(e.to_string())
                }
            })?;

        if response.status() != StatusCode::OK {
            return Err(ResolutionWarning::Status(response.status().as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ResolutionWarning::Timeout
            } else {
                ResolutionWarning::Network(e.to_string())
            }
        })?;
        let metadata: ReleaseMetadata =
            serde_json::from_str(&body).map_err(|e| ResolutionWarning::Parse(e.to_string()))?;

        let asset = metadata
            .assets
            .into_iter()
            .find(|a| {
                self.format.matches_name(&a.name) || self.format.matches_content_type(&a.content_type)
            })
            .ok_or(ResolutionWarning::NoMatchingAsset)?;

        debug!("Resolved {} to asset {}", url, asset.name);
        Ok(asset.browser_download_url)
    }

    /// Rewrite a release page URL to its metadata API URL.
    ///
    /// - `<host>/<owner>/<repo>/releases` and `.../releases/latest` map to
    ///   `<api>/repos/<owner>/<repo>/releases/latest`
    /// - `.../releases/tag/<tag>` maps to `<api>/repos/<owner>/<repo>/releases/tags/<tag>`
    pub fn metadata_url(&self, release_page: &str) -> Option<Url> {
        let page = Url::parse(release_page).ok()?;
        let segments: Vec<&str> = page.path_segments()?.filter(|s| !s.is_empty()).collect();

        let tail = match segments.as_slice() {
            [owner, repo, "releases"] | [owner, repo, "releases", "latest"] => {
                format!("repos/{owner}/{repo}/releases/latest")
            }
            [owner, repo, "releases", "tag", tag] => {
                format!("repos/{owner}/{repo}/releases/tags/{tag}")
            }
            _ => return None,
        };

        let base = if self.metadata_host.contains("://") {
            self.metadata_host.trim_end_matches('/').to_string()
        } else {
            format!("{}://{}", page.scheme(), self.metadata_host.trim_end_matches('/'))
        };

        Url::parse(&format!("{base}/{tail}")).ok()
    }
}
