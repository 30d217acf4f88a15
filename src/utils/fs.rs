//! File system helpers for package download sessions.
//!
//! Every download session writes to its own file, named
//! `app-update-<UTC timestamp>-<sequence><extension>`. The timestamp keeps
//! names unique across process restarts and the sequence keeps them unique
//! within one process, so two sessions never write to the same path.

use crate::constants::DOWNLOAD_FILE_PREFIX;
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, warn};

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Ensures a directory exists, creating it and its parents if necessary.
///
/// # Errors
///
/// Returns an error if the path exists but is not a directory, or if creation fails.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display())),
        Err(_) => fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory: {}", path.display())),
    }
}

/// Build a fresh, never-before-used session file path inside `dir`.
///
/// The file is not created.
pub fn session_file_path(dir: &Path, extension: &str) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let sequence = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{DOWNLOAD_FILE_PREFIX}{timestamp}-{sequence}{extension}"))
}

/// Whether `path` names a download session file.
pub fn is_session_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(DOWNLOAD_FILE_PREFIX))
}

/// Remove session files left behind by earlier downloads.
///
/// Files listed in `keep` (for example the file of a session still in
/// flight) and files without the session prefix are left alone. A missing
/// directory is not an error. Returns the removed paths.
pub async fn cleanup_stale_downloads(dir: &Path, keep: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read download directory: {}", dir.display()));
        }
    };

    let keep: HashSet<&Path> = keep.iter().map(PathBuf::as_path).collect();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_session_file(&path) || keep.contains(path.as_path()) {
            continue;
        }
        if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed stale download {}", path.display());
                removed.push(path);
            }
            Err(e) => warn!("Could not remove stale download {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}
