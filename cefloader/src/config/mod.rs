//! Loader configuration.
//!
//! [`LoaderConfig`] is what the pipeline consumes. It can be built in code
//! with the `with_*` methods, or derived from the user's INI file through
//! [`ConfigFile::to_loader_config`].

mod file;
mod keys;

pub use file::{
    config_file_path, timeout_from_minutes, CefSettings, ConfigFile, DownloadSettings,
    InstallSettings, DEFAULT_TIMEOUT_MINUTES,
};
pub use keys::ConfigKey;

use std::path::PathBuf;
use std::time::Duration;

use crate::download::DEFAULT_CHUNK_TIMEOUT;
use crate::error::{LoaderError, LoaderResult};
use crate::index::{BuildIdentifier, DEFAULT_CDN_BASE_URL};
use crate::platform::{Architecture, Platform, PlatformIdentifier};

/// Name of the staging directory created under the system temp dir.
const STAGING_DIR_NAME: &str = "cefloader-staging";

/// Number of ranged download workers for this host.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Directory of the running executable, or `.` when it cannot be determined.
pub fn default_app_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Everything one install run needs to know.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Target operating system.
    pub platform: Platform,

    /// Target processor architecture.
    pub architecture: Architecture,

    /// CEF build to install.
    pub build: BuildIdentifier,

    /// Application name written into `Info.plist` on macOS.
    ///
    /// When unset, the running executable's name is used.
    pub app_name: Option<String>,

    /// Directory the runtime files are installed into.
    pub app_dir: PathBuf,

    /// Parent directory for the run's temporary files.
    pub staging_dir: PathBuf,

    /// CDN serving `index.json` and the archives.
    pub cdn_base_url: String,

    /// Maximum simultaneous ranged requests.
    pub workers: usize,

    /// Timeout for each ranged request.
    pub chunk_timeout: Duration,

    /// Whether to check the archive against the index's size and SHA-1.
    pub verify_checksum: bool,
}

impl LoaderConfig {
    /// Create a configuration for `build` targeting the current host.
    pub fn new(build: BuildIdentifier) -> Self {
        Self {
            platform: Platform::current(),
            architecture: Architecture::current(),
            build,
            app_name: None,
            app_dir: default_app_dir(),
            staging_dir: std::env::temp_dir().join(STAGING_DIR_NAME),
            cdn_base_url: DEFAULT_CDN_BASE_URL.to_string(),
            workers: default_workers(),
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            verify_checksum: true,
        }
    }

    /// Set the target platform and architecture.
    pub fn with_target(mut self, platform: Platform, architecture: Architecture) -> Self {
        self.platform = platform;
        self.architecture = architecture;
        self
    }

    /// Set the application name used for the `Info.plist` patch.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the install directory.
    pub fn with_app_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.app_dir = path.into();
        self
    }

    /// Set the staging directory.
    pub fn with_staging_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_dir = path.into();
        self
    }

    /// Set the CDN base URL.
    pub fn with_cdn_base_url(mut self, url: impl Into<String>) -> Self {
        self.cdn_base_url = url.into();
        self
    }

    /// Set the number of ranged download workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-chunk timeout.
    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    /// Enable or disable archive verification.
    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// The build-index key for the configured target.
    pub fn platform_identifier(&self) -> LoaderResult<PlatformIdentifier> {
        PlatformIdentifier::new(self.platform, self.architecture)
    }

    /// The app name to write into `Info.plist`: the configured name unless
    /// blank, otherwise the running executable's file stem.
    pub fn effective_app_name(&self) -> Option<String> {
        self.app_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().to_string()))
            })
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> LoaderResult<()> {
        if self.build.cef_version.trim().is_empty() {
            return Err(LoaderError::InvalidConfig(
                "cef_version must be set".to_string(),
            ));
        }
        if self.build.chromium_version.trim().is_empty() {
            return Err(LoaderError::InvalidConfig(
                "chromium_version must be set".to_string(),
            ));
        }
        if self.cdn_base_url.trim().is_empty() {
            return Err(LoaderError::InvalidConfig(
                "cdn_base_url must not be empty".to_string(),
            ));
        }
        if self.chunk_timeout.is_zero() {
            return Err(LoaderError::InvalidConfig(
                "chunk timeout must be greater than zero".to_string(),
            ));
        }
        self.platform_identifier().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> BuildIdentifier {
        BuildIdentifier::new("87.1.14+ga29e9a3+chromium-87.0.4280.141", "87.0.4280.141")
    }

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::new(build());
        assert_eq!(config.cdn_base_url, DEFAULT_CDN_BASE_URL);
        assert_eq!(config.chunk_timeout, Duration::from_secs(600));
        assert!(config.workers >= 1);
        assert!(config.verify_checksum);
        assert!(config.staging_dir.ends_with(STAGING_DIR_NAME));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = LoaderConfig::new(build())
            .with_target(Platform::Linux, Architecture::Arm)
            .with_app_name("MyApp")
            .with_app_dir("/opt/myapp")
            .with_staging_dir("/tmp/stage")
            .with_cdn_base_url("https://mirror.example.com")
            .with_workers(2)
            .with_chunk_timeout(Duration::from_secs(30))
            .with_verify_checksum(false);

        assert_eq!(config.platform_identifier().unwrap().as_str(), "linuxarm");
        assert_eq!(config.app_name.as_deref(), Some("MyApp"));
        assert_eq!(config.app_dir, PathBuf::from("/opt/myapp"));
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/stage"));
        assert_eq!(config.workers, 2);
        assert!(!config.verify_checksum);
    }

    #[test]
    fn test_effective_app_name_prefers_configured() {
        let config = LoaderConfig::new(build()).with_app_name("MyApp");
        assert_eq!(config.effective_app_name().as_deref(), Some("MyApp"));
    }

    #[test]
    fn test_blank_app_name_falls_back_to_executable() {
        let config = LoaderConfig::new(build()).with_app_name("   ");
        let name = config.effective_app_name().unwrap();
        assert!(!name.trim().is_empty());
    }

    #[test]
    fn test_validate_rejects_unsupported_target() {
        let config = LoaderConfig::new(build()).with_target(Platform::MacOsx, Architecture::X86);
        assert!(matches!(
            config.validate(),
            Err(LoaderError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_versions() {
        let config = LoaderConfig::new(BuildIdentifier::new("", "87.0"));
        assert!(matches!(config.validate(), Err(LoaderError::InvalidConfig(_))));
    }
}
