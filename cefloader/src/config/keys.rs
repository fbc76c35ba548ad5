//! Addressable configuration keys (`section.key`) for get/set tooling.

use std::path::PathBuf;
use std::str::FromStr;

use super::file::{parse_bool, parse_number, timeout_from_minutes, ConfigFile};
use crate::error::{LoaderError, LoaderResult};

/// A single setting in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    CefVersion,
    ChromiumVersion,
    CdnBaseUrl,
    Workers,
    TimeoutMinutes,
    VerifyChecksum,
    AppDir,
    AppName,
    StagingDir,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::CefVersion,
            ConfigKey::ChromiumVersion,
            ConfigKey::CdnBaseUrl,
            ConfigKey::Workers,
            ConfigKey::TimeoutMinutes,
            ConfigKey::VerifyChecksum,
            ConfigKey::AppDir,
            ConfigKey::AppName,
            ConfigKey::StagingDir,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::CefVersion | ConfigKey::ChromiumVersion => "cef",
            ConfigKey::CdnBaseUrl
            | ConfigKey::Workers
            | ConfigKey::TimeoutMinutes
            | ConfigKey::VerifyChecksum => "download",
            ConfigKey::AppDir | ConfigKey::AppName | ConfigKey::StagingDir => "install",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::CefVersion => "cef_version",
            ConfigKey::ChromiumVersion => "chromium_version",
            ConfigKey::CdnBaseUrl => "cdn_base_url",
            ConfigKey::Workers => "workers",
            ConfigKey::TimeoutMinutes => "timeout_minutes",
            ConfigKey::VerifyChecksum => "verify_checksum",
            ConfigKey::AppDir => "app_dir",
            ConfigKey::AppName => "app_name",
            ConfigKey::StagingDir => "staging_dir",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value rendered as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        fn opt(value: &Option<String>) -> String {
            value.clone().unwrap_or_default()
        }
        fn path(value: &Option<PathBuf>) -> String {
            value
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        }

        match self {
            ConfigKey::CefVersion => opt(&config.cef.cef_version),
            ConfigKey::ChromiumVersion => opt(&config.cef.chromium_version),
            ConfigKey::CdnBaseUrl => config.download.cdn_base_url.clone(),
            ConfigKey::Workers => config
                .download
                .workers
                .map(|w| w.to_string())
                .unwrap_or_default(),
            ConfigKey::TimeoutMinutes => config.download.timeout_minutes.to_string(),
            ConfigKey::VerifyChecksum => config.download.verify_checksum.to_string(),
            ConfigKey::AppDir => path(&config.install.app_dir),
            ConfigKey::AppName => opt(&config.install.app_name),
            ConfigKey::StagingDir => path(&config.install.staging_dir),
        }
    }

    /// Parse and store `value`. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> LoaderResult<()> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());

        match self {
            ConfigKey::CefVersion => config.cef.cef_version = text,
            ConfigKey::ChromiumVersion => config.cef.chromium_version = text,
            ConfigKey::CdnBaseUrl => {
                config.download.cdn_base_url = text.ok_or_else(|| {
                    LoaderError::InvalidConfig("download.cdn_base_url cannot be empty".to_string())
                })?
            }
            ConfigKey::Workers => {
                config.download.workers = match text {
                    Some(v) => Some(parse_number("download.workers", &v)? as usize),
                    None => None,
                }
            }
            ConfigKey::TimeoutMinutes => {
                let minutes = parse_number("download.timeout_minutes", value)?;
                timeout_from_minutes(minutes)?;
                config.download.timeout_minutes = minutes;
            }
            ConfigKey::VerifyChecksum => {
                config.download.verify_checksum = parse_bool("download.verify_checksum", value)?
            }
            ConfigKey::AppDir => config.install.app_dir = text.map(PathBuf::from),
            ConfigKey::AppName => config.install.app_name = text,
            ConfigKey::StagingDir => config.install.staging_dir = text.map(PathBuf::from),
        }

        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LoaderError::InvalidConfig(format!("unknown configuration key '{}'", s)))
    }
}
