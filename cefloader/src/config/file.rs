//! INI configuration file.
//!
//! ```ini
//! [cef]
//! cef_version = 87.1.14+ga29e9a3+chromium-87.0.4280.141
//! chromium_version = 87.0.4280.141
//!
//! [download]
//! cdn_base_url = https://cef-builds.spotifycdn.com
//! workers = 8
//! timeout_minutes = 10
//! verify_checksum = true
//!
//! [install]
//! app_dir = /opt/myapp
//! app_name = MyApp
//! staging_dir = /tmp/cefloader-staging
//! ```
//!
//! Every key is optional. Missing keys keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::debug;

use super::{default_app_dir, LoaderConfig};
use crate::error::{LoaderError, LoaderResult};
use crate::index::{BuildIdentifier, DEFAULT_CDN_BASE_URL};

/// Default per-chunk timeout, in minutes.
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 10;

/// Default location: `<config dir>/cefloader/config.ini`.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cefloader")
        .join("config.ini")
}

/// `[cef]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CefSettings {
    pub cef_version: Option<String>,
    pub chromium_version: Option<String>,
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub cdn_base_url: String,
    /// `None` means one worker per available CPU.
    pub workers: Option<usize>,
    pub timeout_minutes: u64,
    pub verify_checksum: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            cdn_base_url: DEFAULT_CDN_BASE_URL.to_string(),
            workers: None,
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            verify_checksum: true,
        }
    }
}

/// `[install]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSettings {
    pub app_dir: Option<PathBuf>,
    pub app_name: Option<String>,
    pub staging_dir: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub cef: CefSettings,
    pub download: DownloadSettings,
    pub install: InstallSettings,
}

impl ConfigFile {
    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> LoaderResult<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> LoaderResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| {
            LoaderError::InvalidConfig(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> LoaderResult<Self> {
        let ini = Ini::load_from_str(text)
            .map_err(|e| LoaderError::InvalidConfig(format!("failed to parse config: {}", e)))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> LoaderResult<Self> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("cef")) {
            config.cef.cef_version = non_empty(section.get("cef_version"));
            config.cef.chromium_version = non_empty(section.get("chromium_version"));
        }

        if let Some(section) = ini.section(Some("download")) {
            if let Some(url) = non_empty(section.get("cdn_base_url")) {
                config.download.cdn_base_url = url;
            }
            if let Some(v) = non_empty(section.get("workers")) {
                config.download.workers = Some(parse_number("download.workers", &v)? as usize);
            }
            if let Some(v) = non_empty(section.get("timeout_minutes")) {
                config.download.timeout_minutes = parse_number("download.timeout_minutes", &v)?;
            }
            if let Some(v) = non_empty(section.get("verify_checksum")) {
                config.download.verify_checksum = parse_bool("download.verify_checksum", &v)?;
            }
        }

        if let Some(section) = ini.section(Some("install")) {
            config.install.app_dir = non_empty(section.get("app_dir")).map(PathBuf::from);
            config.install.app_name = non_empty(section.get("app_name"));
            config.install.staging_dir = non_empty(section.get("staging_dir")).map(PathBuf::from);
        }

        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> LoaderResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> LoaderResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LoaderError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        self.to_ini()
            .write_to_file(path)
            .map_err(|e| LoaderError::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        let mut cef = ini.with_section(Some("cef"));
        if let Some(v) = &self.cef.cef_version {
            cef.set("cef_version", v.as_str());
        }
        if let Some(v) = &self.cef.chromium_version {
            cef.set("chromium_version", v.as_str());
        }

        let mut download = ini.with_section(Some("download"));
        download
            .set("cdn_base_url", self.download.cdn_base_url.as_str())
            .set("timeout_minutes", self.download.timeout_minutes.to_string())
            .set("verify_checksum", self.download.verify_checksum.to_string());
        if let Some(workers) = self.download.workers {
            download.set("workers", workers.to_string());
        }

        let mut install = ini.with_section(Some("install"));
        if let Some(v) = &self.install.app_dir {
            install.set("app_dir", v.to_string_lossy().to_string());
        }
        if let Some(v) = &self.install.app_name {
            install.set("app_name", v.as_str());
        }
        if let Some(v) = &self.install.staging_dir {
            install.set("staging_dir", v.to_string_lossy().to_string());
        }

        ini
    }

    /// Build a [`LoaderConfig`] for the configured build.
    ///
    /// Fails with `InvalidConfig` when either version is missing.
    pub fn to_loader_config(&self) -> LoaderResult<LoaderConfig> {
        let cef_version = self.cef.cef_version.clone().ok_or_else(|| {
            LoaderError::InvalidConfig("cef.cef_version is not set".to_string())
        })?;
        let chromium_version = self.cef.chromium_version.clone().ok_or_else(|| {
            LoaderError::InvalidConfig("cef.chromium_version is not set".to_string())
        })?;

        let mut config = LoaderConfig::new(BuildIdentifier::new(cef_version, chromium_version))
            .with_cdn_base_url(self.download.cdn_base_url.clone())
            .with_chunk_timeout(timeout_from_minutes(self.download.timeout_minutes)?)
            .with_verify_checksum(self.download.verify_checksum)
            .with_app_dir(self.install.app_dir.clone().unwrap_or_else(default_app_dir));

        if let Some(workers) = self.download.workers {
            config = config.with_workers(workers);
        }
        if let Some(name) = &self.install.app_name {
            config = config.with_app_name(name.clone());
        }
        if let Some(dir) = &self.install.staging_dir {
            config = config.with_staging_dir(dir.clone());
        }

        Ok(config)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Convert a timeout given in minutes into a [`Duration`].
///
/// Fails with `InvalidConfig` when the value does not fit in seconds.
pub fn timeout_from_minutes(minutes: u64) -> LoaderResult<Duration> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            LoaderError::InvalidConfig(format!(
                "download.timeout_minutes is too large: {}",
                minutes
            ))
        })
}

pub(super) fn parse_number(key: &str, value: &str) -> LoaderResult<u64> {
    value.trim().parse().map_err(|_| {
        LoaderError::InvalidConfig(format!("{} must be a whole number, got '{}'", key, value))
    })
}

pub(super) fn parse_bool(key: &str, value: &str) -> LoaderResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(LoaderError::InvalidConfig(format!(
            "{} must be true or false, got '{}'",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[cef]
cef_version = 87.1.14+ga29e9a3+chromium-87.0.4280.141
chromium_version = 87.0.4280.141

[download]
cdn_base_url = https://mirror.example.com/
workers = 6
timeout_minutes = 3
verify_checksum = no

[install]
app_dir = /opt/myapp
app_name = MyApp
"#;

    #[test]
    fn test_parse_sample() {
        let config = ConfigFile::parse(SAMPLE).unwrap();

        assert_eq!(config.cef.chromium_version.as_deref(), Some("87.0.4280.141"));
        assert_eq!(config.download.workers, Some(6));
        assert_eq!(config.download.timeout_minutes, 3);
        assert!(!config.download.verify_checksum);
        assert_eq!(config.install.app_dir, Some(PathBuf::from("/opt/myapp")));
        assert_eq!(config.install.staging_dir, None);
    }

    #[test]
    fn test_to_loader_config() {
        let loader = ConfigFile::parse(SAMPLE).unwrap().to_loader_config().unwrap();

        assert_eq!(loader.build.cef_version, "87.1.14+ga29e9a3+chromium-87.0.4280.141");
        assert_eq!(loader.workers, 6);
        assert_eq!(loader.chunk_timeout, Duration::from_secs(180));
        assert!(!loader.verify_checksum);
        assert_eq!(loader.app_name.as_deref(), Some("MyApp"));
    }

    #[test]
    fn test_missing_versions_rejected() {
        let result = ConfigFile::default().to_loader_config();
        assert!(matches!(result, Err(LoaderError::InvalidConfig(_))));
    }

    #[test]
    fn test_huge_timeout_rejected() {
        let text = format!(
            "[cef]\ncef_version = 87.1.14\nchromium_version = 87.0.4280.141\n\
             [download]\ntimeout_minutes = {}\n",
            u64::MAX
        );
        let config = ConfigFile::parse(&text).unwrap();
        assert_eq!(config.download.timeout_minutes, u64::MAX);

        let result = config.to_loader_config();
        assert!(matches!(result, Err(LoaderError::InvalidConfig(_))));
    }

    #[test]
    fn test_timeout_from_minutes() {
        assert_eq!(timeout_from_minutes(3).unwrap(), Duration::from_secs(180));
        assert!(timeout_from_minutes(u64::MAX / 60 + 1).is_err());
    }

    #[test]
    fn test_invalid_number() {
        let result = ConfigFile::parse("[download]\nworkers = many\n");
        assert!(matches!(result, Err(LoaderError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_bool() {
        let result = ConfigFile::parse("[download]\nverify_checksum = maybe\n");
        assert!(matches!(result, Err(LoaderError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let original = ConfigFile::parse(SAMPLE).unwrap();
        original.save_to(&path).unwrap();
        let reloaded = ConfigFile::load_from(&path).unwrap();

        assert_eq!(reloaded, original);
    }

    #[test]
    fn test_config_file_path() {
        let path = config_file_path();
        assert!(path.ends_with("cefloader/config.ini"));
    }
}
