//! Build index document model.
//!
//! Mirrors the JSON served at `{cdn}/index.json`:
//!
//! ```text
//! { "<platform>": { "versions": [ { "cef_version", "channel",
//!   "chromium_version", "files": [ { "type", "size", "sha1", "name",
//!   "last_modified" } ] } ] } }
//! ```
//!
//! Unknown fields are ignored.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Release channel the loader selects builds from.
pub const STABLE_CHANNEL: &str = "stable";

/// Artifact kind the loader installs.
pub const MINIMAL_ARTIFACT: &str = "minimal";

/// Archive extension published by the CDN.
pub const ARCHIVE_EXTENSION: &str = ".tar.bz2";

/// The whole index, keyed by platform identifier (e.g. `linuxarm`).
pub type BuildIndex = HashMap<String, OsBuilds>;

/// All published builds for one platform identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsBuilds {
    #[serde(default)]
    pub versions: Vec<BuildEntry>,
}

/// One published build and its artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEntry {
    pub cef_version: String,
    #[serde(default)]
    pub channel: String,
    pub chromium_version: String,
    #[serde(default)]
    pub files: Vec<ArchiveDescriptor>,
}

impl BuildEntry {
    /// Whether this entry is the stable release of `build`.
    pub fn is_stable_release_of(&self, build: &BuildIdentifier) -> bool {
        self.cef_version == build.cef_version
            && self.chromium_version == build.chromium_version
            && self.channel == STABLE_CHANNEL
    }

    /// The first `minimal` artifact of this build, if any.
    pub fn minimal_artifact(&self) -> Option<&ArchiveDescriptor> {
        self.files.iter().find(|f| f.kind == MINIMAL_ARTIFACT)
    }
}

/// A single downloadable archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDescriptor {
    /// Artifact kind: `standard`, `minimal`, `client`, `debug_symbols`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// Declared size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Declared SHA-1 digest, lowercase hex.
    #[serde(default)]
    pub sha1: String,
    /// File name on the CDN.
    pub name: String,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ArchiveDescriptor {
    /// Name of the top-level directory inside the archive.
    ///
    /// The CDN percent-encodes `+` in archive names; the directory inside the
    /// tarball uses the literal character and has no extension.
    pub fn folder_name(&self) -> String {
        let decoded = self.name.replace("%2B", "+").replace("%2b", "+");
        decoded
            .strip_suffix(ARCHIVE_EXTENSION)
            .map(str::to_string)
            .unwrap_or(decoded)
    }
}

/// A CEF release, identified by its CEF and Chromium versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildIdentifier {
    pub cef_version: String,
    pub chromium_version: String,
}

impl BuildIdentifier {
    pub fn new(cef_version: impl Into<String>, chromium_version: impl Into<String>) -> Self {
        Self {
            cef_version: cef_version.into(),
            chromium_version: chromium_version.into(),
        }
    }
}

impl fmt::Display for BuildIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (chromium {})", self.cef_version, self.chromium_version)
    }
}
