//! Version handling for update gating.
//!
//! - [`comparison`] - Total, never-failing dotted-numeric comparison
//! - [`InstalledVersion`] - Where the running build's version comes from
//!
//! The installed version is read once per startup check. Reading it never
//! fails: any source that yields nothing usable resolves to
//! [`UNKNOWN_VERSION`], which compares as older than every real release.

pub mod comparison;

pub use comparison::VersionComparator;

use crate::constants::UNKNOWN_VERSION;
use tracing::{debug, warn};

/// Source of the installed application version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstalledVersion {
    /// Version embedded in the binary at build time.
    #[default]
    Embedded,
    /// Explicit version, usually from configuration.
    Override(String),
}

impl InstalledVersion {
    /// Build from an optional configuration override.
    pub fn from_override(value: Option<&str>) -> Self {
        match value {
            Some(v) => Self::Override(v.to_string()),
            None => Self::Embedded,
        }
    }

    /// Resolve to a version string, falling back to `"0.0.0"`.
    pub fn read(&self) -> String {
        let raw = match self {
            Self::Embedded => option_env!("CARGO_PKG_VERSION").unwrap_or_default(),
            Self::Override(v) => v.as_str(),
        };

        // Build metadata and pre-release tags are not part of gating
        let core = raw.trim().split(['-', '+']).next().unwrap_or_default();

        if VersionComparator::is_well_formed(core) {
            debug!("Installed version: {}", core);
            core.trim_start_matches(['v', 'V']).to_string()
        } else {
            warn!("Unreadable installed version {:?}, using {}", raw, UNKNOWN_VERSION);
            UNKNOWN_VERSION.to_string()
        }
    }
}
