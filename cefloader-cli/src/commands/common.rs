//! Common arguments and helpers shared across CLI commands.

use std::path::{Path, PathBuf};

use cefloader::config::{config_file_path, ConfigFile};
use cefloader::{Architecture, LoaderConfig, Platform};
use clap::Args;

use crate::error::CliError;

/// Which build to fetch and for which target.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// CEF version, e.g. 87.1.14+ga29e9a3+chromium-87.0.4280.141
    #[arg(long)]
    pub cef_version: Option<String>,

    /// Chromium version the CEF build is based on, e.g. 87.0.4280.141
    #[arg(long)]
    pub chromium_version: Option<String>,

    /// Target platform (windows, linux, macosx). Defaults to this host
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Target architecture (x86, x64, arm, arm64). Defaults to this host
    #[arg(long)]
    pub arch: Option<Architecture>,

    /// CDN base URL serving index.json
    #[arg(long)]
    pub cdn: Option<String>,
}

/// Load the config file from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let path = path.map(expand_tilde).unwrap_or_else(config_file_path);
    Ok(ConfigFile::load_from(&path)?)
}

/// Build a loader configuration. CLI arguments take precedence, then the
/// config file.
pub fn resolve_loader_config(
    config: &ConfigFile,
    target: &TargetArgs,
) -> Result<LoaderConfig, CliError> {
    let cef_version = target
        .cef_version
        .clone()
        .or_else(|| config.cef.cef_version.clone())
        .ok_or_else(|| missing_version("--cef-version", "cef.cef_version"))?;
    let chromium_version = target
        .chromium_version
        .clone()
        .or_else(|| config.cef.chromium_version.clone())
        .ok_or_else(|| missing_version("--chromium-version", "cef.chromium_version"))?;

    let mut file = config.clone();
    file.cef.cef_version = Some(cef_version);
    file.cef.chromium_version = Some(chromium_version);
    let mut loader = file.to_loader_config()?;

    if target.platform.is_some() || target.arch.is_some() {
        let platform = target.platform.unwrap_or(loader.platform);
        let arch = target.arch.unwrap_or(loader.architecture);
        loader = loader.with_target(platform, arch);
    }
    if let Some(cdn) = &target.cdn {
        loader = loader.with_cdn_base_url(cdn.clone());
    }

    Ok(loader)
}

fn missing_version(flag: &str, key: &str) -> CliError {
    CliError::Config(format!(
        "No CEF build selected. Pass {} or run 'cefloader config set {} <value>'.",
        flag, key
    ))
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
