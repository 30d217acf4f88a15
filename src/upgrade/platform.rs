//! Runtime platform detection and native package formats.

use crate::constants::{APK_EXTENSION, APK_MIME_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platforms the update manager knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Linux,
    Macos,
    Windows,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub const fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        }
    }

    /// Native package format installable through the update manager.
    ///
    /// Only Android packages are handled; other platforms update through their
    /// store and get `None`.
    pub const fn package_format(self) -> Option<PackageFormat> {
        match self {
            Self::Android => Some(PackageFormat::APK),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" => Ok(Self::Macos),
            "windows" => Ok(Self::Windows),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// A native package format: what a downloadable artifact looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageFormat {
    /// File extension including the leading dot (e.g. `.apk`).
    pub extension: &'static str,
    /// MIME type the platform installer registers for.
    pub mime_type: &'static str,
}

impl PackageFormat {
    /// Android application package.
    pub const APK: Self = Self {
        extension: APK_EXTENSION,
        mime_type: APK_MIME_TYPE,
    };

    /// Whether a URL or file name points directly at an artifact of this format.
    ///
    /// Query strings and fragments are ignored; the comparison is
    /// case-insensitive.
    pub fn matches_name(&self, name: &str) -> bool {
        let path = name.split(['?', '#']).next().unwrap_or_default();
        path.to_ascii_lowercase().ends_with(self.extension)
    }

    /// Whether a declared content type names this format.
    pub fn matches_content_type(&self, content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(self.mime_type))
    }
}
