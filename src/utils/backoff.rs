//! Exponential backoff utilities for retry operations.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay before retry number `attempt` (0-based).
///
/// 250ms, 500ms, 1s, 2s... capped at 2s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(STARTING_BACKOFF_DELAY_MS.saturating_mul(factor).min(MAX_BACKOFF_DELAY_MS))
}

/// Performs exponential backoff with delay.
///
/// Sleeps for [`backoff_delay`] of `attempt` and returns the next attempt
/// number.
pub async fn exponential_backoff_with_delay(attempt: u32) -> u32 {
    tokio::time::sleep(backoff_delay(attempt)).await;
    attempt.saturating_add(1)
}

/// Like [`exponential_backoff_with_delay`], but wakes early on cancellation.
///
/// Returns `None` when `cancel` fired during the wait.
pub async fn cancellable_backoff(attempt: u32, cancel: &CancellationToken) -> Option<u32> {
    tokio::select! {
        () = cancel.cancelled() => None,
        next = exponential_backoff_with_delay(attempt) => Some(next),
    }
}
