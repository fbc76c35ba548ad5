//! Build index client.
//!
//! Resolves the archive for a platform and CEF build by reading the CDN's
//! `index.json`. A missing archive is an expected outcome, so resolution
//! reports a [`ResolutionMiss`] reason instead of an error.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{ArchiveDescriptor, BuildIdentifier, BuildIndex};
use crate::http::HttpTransport;
use crate::platform::{Architecture, Platform, PlatformIdentifier};

/// Default CEF build CDN.
pub const DEFAULT_CDN_BASE_URL: &str = "https://cef-builds.spotifycdn.com";

/// Why an archive could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolutionMiss {
    /// The index request failed or returned an empty body.
    #[error("build index unavailable")]
    IndexUnavailable,
    /// The index body is not a valid index document.
    #[error("build index unreadable")]
    IndexUnreadable,
    /// The index has no entry for the platform identifier.
    #[error("platform not listed in build index")]
    PlatformNotListed,
    /// No stable build matches the requested versions.
    #[error("no stable build with the requested versions")]
    BuildNotFound,
    /// The matching build publishes no minimal archive.
    #[error("build has no minimal archive")]
    NoMinimalArtifact,
}

/// Source of archive descriptors and download URLs.
pub trait ArchiveResolver: Send + Sync {
    /// Resolve the minimal stable archive for a platform and build.
    fn resolve_archive(
        &self,
        platform: Platform,
        architecture: Architecture,
        build: &BuildIdentifier,
    ) -> Result<ArchiveDescriptor, ResolutionMiss>;

    /// Absolute URL of an archive on the CDN.
    fn download_url(&self, archive_name: &str) -> String;
}

/// Client for the CEF build index.
pub struct BuildIndexClient<T: HttpTransport> {
    transport: Arc<T>,
    base_url: String,
}

impl<T: HttpTransport> BuildIndexClient<T> {
    /// Create a client against the default CDN.
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_base_url(transport, DEFAULT_CDN_BASE_URL)
    }

    /// Create a client against a custom CDN. A trailing `/` is trimmed.
    pub fn with_base_url(transport: Arc<T>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the index document.
    pub fn index_url(&self) -> String {
        format!("{}/index.json", self.base_url)
    }

    /// Fetch and parse the index.
    pub fn fetch_index(&self) -> Result<BuildIndex, ResolutionMiss> {
        let url = self.index_url();
        let body = self.transport.get(&url).map_err(|e| {
            warn!(url = %url, error = %e, "Failed to fetch build index");
            ResolutionMiss::IndexUnavailable
        })?;

        if body.is_empty() {
            warn!(url = %url, "Build index is empty");
            return Err(ResolutionMiss::IndexUnavailable);
        }

        serde_json::from_slice(&body).map_err(|e| {
            warn!(url = %url, error = %e, "Failed to parse build index");
            ResolutionMiss::IndexUnreadable
        })
    }

    /// Resolve the archive for `build` on the given platform.
    pub fn resolve_archive(
        &self,
        platform: Platform,
        architecture: Architecture,
        build: &BuildIdentifier,
    ) -> Result<ArchiveDescriptor, ResolutionMiss> {
        let platform_id = PlatformIdentifier::new(platform, architecture).map_err(|e| {
            debug!(error = %e, "No index key for platform");
            ResolutionMiss::PlatformNotListed
        })?;

        let mut index = self.fetch_index()?;
        let builds = index
            .remove(platform_id.as_str())
            .ok_or(ResolutionMiss::PlatformNotListed)?;

        let entry = builds
            .versions
            .into_iter()
            .find(|entry| entry.is_stable_release_of(build))
            .ok_or(ResolutionMiss::BuildNotFound)?;

        let archive = entry
            .minimal_artifact()
            .cloned()
            .ok_or(ResolutionMiss::NoMinimalArtifact)?;

        info!(platform = %platform_id, archive = %archive.name, "Resolved CEF archive");
        Ok(archive)
    }

    /// Resolve just the archive name, or `None` when there is no match.
    pub fn resolve_archive_name(
        &self,
        platform: Platform,
        architecture: Architecture,
        build: &BuildIdentifier,
    ) -> Option<String> {
        self.resolve_archive(platform, architecture, build)
            .ok()
            .map(|archive| archive.name)
    }

    /// `{base_url}/{archive_name}`.
    pub fn download_url(&self, archive_name: &str) -> String {
        format!("{}/{}", self.base_url, archive_name)
    }
}

impl<T: HttpTransport> ArchiveResolver for BuildIndexClient<T> {
    fn resolve_archive(
        &self,
        platform: Platform,
        architecture: Architecture,
        build: &BuildIdentifier,
    ) -> Result<ArchiveDescriptor, ResolutionMiss> {
        BuildIndexClient::resolve_archive(self, platform, architecture, build)
    }

    fn download_url(&self, archive_name: &str) -> String {
        BuildIndexClient::download_url(self, archive_name)
    }
}

impl<T: HttpTransport> std::fmt::Debug for BuildIndexClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildIndexClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockTransport;

    const BASE: &str = "https://test-host.spotifycdn.com";
    const CEF: &str = "87.1.14+ga29e9a3+chromium-87.0.4280.141";
    const CHROMIUM: &str = "87.0.4280.141";

    fn index_json() -> String {
        serde_json::json!({
            "linuxarm": {
                "versions": [
                    {
                        "cef_version": CEF,
                        "channel": "beta",
                        "chromium_version": CHROMIUM,
                        "files": [
                            { "type": "minimal", "size": 1, "sha1": "", "name": "beta.tar.bz2" }
                        ]
                    },
                    {
                        "cef_version": CEF,
                        "channel": "stable",
                        "chromium_version": CHROMIUM,
                        "files": [
                            { "type": "standard", "size": 10, "sha1": "", "name": "std.tar.bz2" },
                            {
                                "type": "minimal",
                                "size": 5,
                                "sha1": "",
                                "name": format!("cef_binary_{}_linuxarm_minimal.tar.bz2", CEF)
                            },
                            { "type": "minimal", "size": 6, "sha1": "", "name": "second.tar.bz2" }
                        ]
                    }
                ]
            },
            "windows64": {
                "versions": [{
                    "cef_version": CEF,
                    "channel": "stable",
                    "chromium_version": CHROMIUM,
                    "files": [{ "type": "client", "size": 1, "sha1": "", "name": "client.tar.bz2" }]
                }]
            }
        })
        .to_string()
    }

    fn client_with(body: impl Into<Vec<u8>>) -> BuildIndexClient<MockTransport> {
        let transport = MockTransport::default().with_body(&format!("{}/index.json", BASE), body);
        BuildIndexClient::with_base_url(Arc::new(transport), BASE)
    }

    fn build() -> BuildIdentifier {
        BuildIdentifier::new(CEF, CHROMIUM)
    }

    #[test]
    fn test_linuxarm_download_url() {
        let client = client_with(index_json());

        let name = client
            .resolve_archive_name(Platform::Linux, Architecture::Arm, &build())
            .unwrap();

        assert_eq!(
            client.download_url(&name),
            format!("{}/cef_binary_{}_linuxarm_minimal.tar.bz2", BASE, CEF)
        );
    }

    #[test]
    fn test_first_minimal_artifact_wins() {
        let client = client_with(index_json());
        let archive = client
            .resolve_archive(Platform::Linux, Architecture::Arm, &build())
            .unwrap();
        assert_eq!(archive.size, 5);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = BuildIndexClient::with_base_url(
            Arc::new(MockTransport::default()),
            "https://cdn.example.com/",
        );
        assert_eq!(client.index_url(), "https://cdn.example.com/index.json");
        assert_eq!(client.download_url("a.tar.bz2"), "https://cdn.example.com/a.tar.bz2");
    }

    #[test]
    fn test_default_base_url() {
        let client = BuildIndexClient::new(Arc::new(MockTransport::default()));
        assert_eq!(client.base_url(), DEFAULT_CDN_BASE_URL);
    }

    #[test]
    fn test_index_unavailable() {
        let client = BuildIndexClient::with_base_url(Arc::new(MockTransport::default()), BASE);
        let result = client.resolve_archive(Platform::Linux, Architecture::Arm, &build());
        assert_eq!(result, Err(ResolutionMiss::IndexUnavailable));
    }

    #[test]
    fn test_empty_index_body() {
        let client = client_with(Vec::new());
        let result = client.resolve_archive(Platform::Linux, Architecture::Arm, &build());
        assert_eq!(result, Err(ResolutionMiss::IndexUnavailable));
    }

    #[test]
    fn test_index_unreadable() {
        let client = client_with("<html>not json</html>");
        let result = client.resolve_archive(Platform::Linux, Architecture::Arm, &build());
        assert_eq!(result, Err(ResolutionMiss::IndexUnreadable));
    }

    #[test]
    fn test_platform_not_listed() {
        let client = client_with(index_json());
        let result = client.resolve_archive(Platform::MacOsx, Architecture::X64, &build());
        assert_eq!(result, Err(ResolutionMiss::PlatformNotListed));
    }

    #[test]
    fn test_unsupported_platform_is_not_listed() {
        let client = client_with(index_json());
        let result = client.resolve_archive(Platform::MacOsx, Architecture::X86, &build());
        assert_eq!(result, Err(ResolutionMiss::PlatformNotListed));
    }

    #[test]
    fn test_build_not_found() {
        let client = client_with(index_json());
        let result = client.resolve_archive(
            Platform::Linux,
            Architecture::Arm,
            &BuildIdentifier::new("1.0.0", CHROMIUM),
        );
        assert_eq!(result, Err(ResolutionMiss::BuildNotFound));
    }

    #[test]
    fn test_no_minimal_artifact() {
        let client = client_with(index_json());
        let result = client.resolve_archive(Platform::Windows, Architecture::X64, &build());
        assert_eq!(result, Err(ResolutionMiss::NoMinimalArtifact));
        assert_eq!(
            client.resolve_archive_name(Platform::Windows, Architecture::X64, &build()),
            None
        );
    }
}
