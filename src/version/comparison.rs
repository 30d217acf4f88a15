//! Dotted-numeric version comparison for update gating.
//!
//! Version strings reaching the gating check come from three places: the
//! embedded build metadata, the backend policy document, and user-editable
//! configuration. None of them is guaranteed to be well formed, so comparison
//! here is total: it never fails and never panics.
//!
//! # Rules
//!
//! - Both strings are split on `.` and compared segment by segment, left to right.
//! - Each segment is read as an unsigned integer; anything that does not parse
//!   (letters, pre-release suffixes, overflow, empty segments) counts as `0`.
//! - Missing trailing segments count as `0`, so `"1.8"` equals `"1.8.0"`.
//! - A single leading `v` and surrounding whitespace are ignored, matching how
//!   release tags are usually written.
//!
//! # Examples
//!
//! ```rust
//! use std::cmp::Ordering;
//! use updatectl::version::comparison::VersionComparator;
//!
//! assert_eq!(VersionComparator::compare("1.8", "1.8.0"), Ordering::Equal);
//! assert_eq!(VersionComparator::compare("1.7.5", "1.8.0"), Ordering::Less);
//! assert_eq!(VersionComparator::compare("1.10.0", "1.9.9"), Ordering::Greater);
//! assert_eq!(VersionComparator::compare_sign("garbage", "0.0.0"), 0);
//! ```

use std::cmp::Ordering;

/// Comparison utilities for dotted-numeric version strings.
///
/// Stateless; all methods are associated functions.
pub struct VersionComparator;

impl VersionComparator {
    /// Compare two version strings.
    ///
    /// Returns [`Ordering::Less`] when `a` is older than `b`, [`Ordering::Greater`]
    /// when it is newer, and [`Ordering::Equal`] when all zero-padded segments
    /// match. Malformed segments compare as `0` instead of failing, which keeps a
    /// broken version string from ever blocking the app on its own.
    pub fn compare(a: &str, b: &str) -> Ordering {
        let left = Self::segments(a);
        let right = Self::segments(b);
        let len = left.len().max(right.len());

        for i in 0..len {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            match l.cmp(&r) {
                Ordering::Equal => continue,
                other => return other,
            }
        }

        Ordering::Equal
    }

    /// Compare two version strings and return `-1`, `0` or `1`.
    ///
    /// Convenience for callers that serialize the result or mirror an
    /// integer-returning comparator contract.
    pub fn compare_sign(a: &str, b: &str) -> i8 {
        match Self::compare(a, b) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// Returns `true` if `installed` is strictly older than `target`.
    pub fn is_older(installed: &str, target: &str) -> bool {
        Self::compare(installed, target) == Ordering::Less
    }

    /// Returns `true` if the string parses into at least one numeric segment
    /// and every segment is numeric.
    ///
    /// Used to decide whether an installed-version source produced something
    /// usable or whether to fall back to [`UNKNOWN_VERSION`](crate::constants::UNKNOWN_VERSION).
    pub fn is_well_formed(version: &str) -> bool {
        let trimmed = Self::normalize(version);
        !trimmed.is_empty()
            && trimmed.split('.').all(|s| !s.is_empty() && s.parse::<u64>().is_ok())
    }

    fn normalize(version: &str) -> &str {
        let trimmed = version.trim();
        trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed)
    }

    fn segments(version: &str) -> Vec<u64> {
        let normalized = Self::normalize(version);
        if normalized.is_empty() {
            return Vec::new();
        }
        normalized.split('.').map(|s| s.trim().parse::<u64>().unwrap_or(0)).collect()
    }
}
