//! Resumable, cancellable download of native package artifacts.
//!
//! [`PackageDownloadManager::download`] runs one download session:
//!
//! 1. Refuse immediately (no network) when the runtime platform cannot
//!    install the package format.
//! 2. Resolve release-listing URLs through [`ReleaseArtifactResolver`].
//! 3. Stream the artifact into a fresh session file, reporting
//!    [`DownloadProgress`] after every chunk.
//! 4. On a dropped connection or a 5xx, back off and resume with
//!    `Range: bytes=<written>-`. A `206` continues at the offset named by its
//!    `Content-Range`; a `200` means the server ignored the range and the
//!    file is restarted. A `416` ends the session once the file already
//!    holds the whole resource.
//!
//! Progress callbacks are delivered in non-decreasing byte order for the whole
//! session: after a restart nothing is reported until the transfer passes the
//! previous high-water mark again.
//!
//! Cancellation and final failure both delete the session file.

use crate::constants::{DEFAULT_MAX_RESUME_ATTEMPTS, user_agent};
use crate::core::UpdateError;
use crate::upgrade::platform::{PackageFormat, Platform};
use crate::upgrade::resolver::ReleaseArtifactResolver;
use crate::utils::backoff::cancellable_backoff;
use crate::utils::fs::{ensure_dir, session_file_path};
use futures::StreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One progress snapshot of a download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    /// Expected size, or 0 when the server did not say.
    pub total_bytes: u64,
    /// `round(bytes / total * 100)`, capped at 100; 0 when the total is unknown.
    pub percent: u8,
}

impl DownloadProgress {
    pub fn new(bytes_downloaded: u64, total_bytes: u64) -> Self {
        let percent = if total_bytes == 0 {
            0
        } else {
            let scaled = (u128::from(bytes_downloaded) * 100 + u128::from(total_bytes) / 2)
                / u128::from(total_bytes);
            scaled.min(100) as u8
        };
        Self {
            bytes_downloaded,
            total_bytes,
            percent,
        }
    }
}

enum StreamFailure {
    /// Worth resuming after a backoff.
    Retryable(String),
    /// Ends the session.
    Fatal(UpdateError),
}

struct Transfer<F> {
    file: File,
    written: u64,
    total: u64,
    reported: u64,
    on_progress: F,
}

impl<F: FnMut(DownloadProgress)> Transfer<F> {
    fn emit(&mut self) {
        if self.written >= self.reported {
            self.reported = self.written;
            (self.on_progress)(DownloadProgress::new(self.written, self.total));
        }
    }

    /// Drop everything from byte `offset` on and continue writing there.
    async fn truncate_to(&mut self, offset: u64) -> Result<(), UpdateError> {
        self.file.set_len(offset).await.map_err(|e| UpdateError::io("truncate package file", &e))?;
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| UpdateError::io("rewind package file", &e))?;
        self.written = offset;
        Ok(())
    }
}

/// Downloads native package artifacts into a local directory.
#[derive(Debug, Clone)]
pub struct PackageDownloadManager {
    client: Client,
    resolver: ReleaseArtifactResolver,
    platform: Platform,
    package_platform: Platform,
    download_dir: PathBuf,
    max_resume_attempts: u32,
}

impl PackageDownloadManager {
    pub fn new(
        client: Client,
        resolver: ReleaseArtifactResolver,
        platform: Platform,
        package_platform: Platform,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            resolver,
            platform,
            package_platform,
            download_dir: download_dir.into(),
            max_resume_attempts: DEFAULT_MAX_RESUME_ATTEMPTS,
        }
    }

    #[must_use]
    pub const fn with_max_resume_attempts(mut self, attempts: u32) -> Self {
        self.max_resume_attempts = attempts;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// The package format this manager downloads.
    ///
    /// # Errors
    ///
    /// [`UpdateError::PlatformUnsupported`] when the runtime platform is not
    /// the package's platform, or the package platform has no native format.
    pub fn package_format(&self) -> Result<PackageFormat, UpdateError> {
        let unsupported = || UpdateError::PlatformUnsupported {
            platform: self.platform.to_string(),
            package_platform: self.package_platform.to_string(),
        };
        if self.platform != self.package_platform {
            return Err(unsupported());
        }
        self.package_platform.package_format().ok_or_else(unsupported)
    }

    /// Download `url` into a new session file and return its path.
    ///
    /// `on_progress` is called at the transport's natural cadence; each call
    /// is a complete snapshot, not an increment.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::PlatformUnsupported`] before any network access
    /// - [`UpdateError::DownloadCancelled`] when `cancel` fires
    /// - [`UpdateError::Download`] when the transfer fails after all resume
    ///   attempts, the server refuses, or the result is empty
    /// - [`UpdateError::Io`] when the session file cannot be written
    pub async fn download<F>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<PathBuf, UpdateError>
    where
        F: FnMut(DownloadProgress),
    {
        let format = self.package_format()?;

        ensure_dir(&self.download_dir).await.map_err(|e| UpdateError::Io {
            operation: "create download directory".to_string(),
            reason: format!("{e:#}"),
        })?;

        let resolved = tokio::select! {
            () = cancel.cancelled() => return Err(UpdateError::DownloadCancelled),
            resolved = self.resolver.resolve(url) => resolved,
        };

        let path = session_file_path(&self.download_dir, format.extension);
        info!("Downloading {} to {}", resolved, path.display());

        let result = self.transfer(&resolved, &path, cancel, on_progress).await;
        match result {
            Ok(0) => {
                remove_partial(&path).await;
                Err(UpdateError::Download {
                    reason: "server returned an empty file".to_string(),
                })
            }
            Ok(bytes) => {
                info!("Downloaded {} bytes to {}", bytes, path.display());
                Ok(path)
            }
            Err(e) => {
                if e == UpdateError::DownloadCancelled {
                    info!("Download cancelled, removing {}", path.display());
                } else {
                    warn!("Download failed: {}", e);
                }
                remove_partial(&path).await;
                Err(e)
            }
        }
    }

    async fn transfer<F>(
        &self,
        url: &str,
        path: &Path,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<u64, UpdateError>
    where
        F: FnMut(DownloadProgress),
    {
        let file = File::create(path)
            .await
            .map_err(|e| UpdateError::io("create package file", &e))?;
        let mut transfer = Transfer {
            file,
            written: 0,
            total: 0,
            reported: 0,
            on_progress,
        };

        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(UpdateError::DownloadCancelled);
            }

            match self.stream_once(url, &mut transfer, cancel).await {
                Ok(()) => break,
                Err(StreamFailure::Fatal(e)) => return Err(e),
                Err(StreamFailure::Retryable(reason)) => {
                    if attempt >= self.max_resume_attempts {
                        return Err(UpdateError::Download {
                            reason: format!("{reason} (gave up after {attempt} resume attempts)"),
                        });
                    }
                    warn!(
                        "Transfer interrupted at {} bytes: {}. Resuming (attempt {}/{})",
                        transfer.written,
                        reason,
                        attempt + 1,
                        self.max_resume_attempts
                    );
                    attempt = cancellable_backoff(attempt, cancel)
                        .await
                        .ok_or(UpdateError::DownloadCancelled)?;
                }
            }
        }

        transfer.file.flush().await.map_err(|e| UpdateError::io("flush package file", &e))?;
        Ok(transfer.written)
    }

    async fn stream_once<F>(
        &self,
        url: &str,
        transfer: &mut Transfer<F>,
        cancel: &CancellationToken,
    ) -> Result<(), StreamFailure>
    where
        F: FnMut(DownloadProgress),
    {
        let mut request = self.client.get(url).header(USER_AGENT, user_agent());
        if transfer.written > 0 {
            request = request.header(RANGE, format!("bytes={}-", transfer.written));
        }

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(StreamFailure::Fatal(UpdateError::DownloadCancelled)),
            response = request.send() => response.map_err(|e| StreamFailure::Retryable(e.to_string()))?,
        };

        let status = response.status();
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        match status {
            StatusCode::PARTIAL_CONTENT => {
                let start = content_range
                    .as_deref()
                    .and_then(content_range_start)
                    .unwrap_or(transfer.written);
                if start > transfer.written {
                    debug!("Server resumed at byte {} instead of {}, restarting", start, transfer.written);
                    transfer.truncate_to(0).await.map_err(StreamFailure::Fatal)?;
                    return Err(StreamFailure::Retryable(format!(
                        "server skipped ahead to byte {start}"
                    )));
                }
                if start < transfer.written {
                    debug!("Server resumed at byte {} instead of {}", start, transfer.written);
                    transfer.truncate_to(start).await.map_err(StreamFailure::Fatal)?;
                }
                transfer.total = content_range
                    .as_deref()
                    .and_then(content_range_total)
                    .or_else(|| response.content_length().map(|len| start + len))
                    .unwrap_or(0);
                debug!("Receiving from byte {} of {}", transfer.written, transfer.total);
            }
            StatusCode::RANGE_NOT_SATISFIABLE if transfer.written > 0 => {
                let total = content_range
                    .as_deref()
                    .and_then(content_range_total)
                    .unwrap_or(transfer.total);
                if total == 0 || transfer.written == total {
                    debug!("Server has nothing past byte {}, transfer complete", transfer.written);
                    transfer.total = total;
                    return Ok(());
                }
                return Err(StreamFailure::Fatal(UpdateError::Download {
                    reason: format!(
                        "server refused range at byte {} of {} bytes",
                        transfer.written, total
                    ),
                }));
            }
            s if s.is_success() => {
                if transfer.written > 0 {
                    debug!("Server ignored range request, restarting from byte 0");
                    transfer.truncate_to(0).await.map_err(StreamFailure::Fatal)?;
                }
                transfer.total = response.content_length().unwrap_or(0);
            }
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                return Err(StreamFailure::Retryable(format!("HTTP {s}")));
            }
            s => {
                return Err(StreamFailure::Fatal(UpdateError::Download {
                    reason: format!("HTTP {s} from {url}"),
                }));
            }
        }

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return Err(StreamFailure::Fatal(UpdateError::DownloadCancelled)),
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Ok(chunk)) => {
                    transfer
                        .file
                        .write_all(&chunk)
                        .await
                        .map_err(|e| StreamFailure::Fatal(UpdateError::io("write package file", &e)))?;
                    transfer.written += chunk.len() as u64;
                    transfer.emit();
                }
                Some(Err(e)) => return Err(StreamFailure::Retryable(e.to_string())),
            }
        }

        if transfer.total > 0 && transfer.written < transfer.total {
            return Err(StreamFailure::Retryable(format!(
                "connection closed after {} of {} bytes",
                transfer.written, transfer.total
            )));
        }
        Ok(())
    }
}

/// Total size from a `Content-Range: bytes <start>-<end>/<total>` header.
fn content_range_total(value: &str) -> Option<u64> {
    value.trim().strip_prefix("bytes ")?.rsplit_once('/')?.1.trim().parse().ok()
}

/// First byte offset from a `Content-Range: bytes <start>-<end>/<total>` header.
fn content_range_start(value: &str) -> Option<u64> {
    value.trim().strip_prefix("bytes ")?.split_once('-')?.0.trim().parse().ok()
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial download {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial download {}: {}", path.display(), e),
    }
}
