//! Placing the extracted runtime into the application directory.
//!
//! Windows and Linux archives ship a `Release` folder with the binaries and a
//! `Resources` folder with paks and locales; both are copied flat into the
//! app directory. macOS archives ship a framework bundle instead, whose main
//! binary is installed as `libcef.dylib` next to the bundle's `Libraries` and
//! `Resources` contents.

use std::fs;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::platform::Platform;

/// Binaries folder inside the extracted archive.
pub const RELEASE_DIR: &str = "Release";

/// Resources folder inside the extracted archive and the macOS framework.
pub const RESOURCES_DIR: &str = "Resources";

/// Framework bundle inside the macOS `Release` folder.
pub const FRAMEWORK_BUNDLE: &str = "Chromium Embedded Framework.framework";

/// Main binary of the framework bundle.
pub const FRAMEWORK_BINARY: &str = "Chromium Embedded Framework";

/// Dependent libraries folder inside the framework bundle.
pub const FRAMEWORK_LIBRARIES_DIR: &str = "Libraries";

/// Installed name of the framework binary.
pub const MAC_LIBRARY_NAME: &str = "libcef.dylib";

/// macOS application property list patched with the app name.
pub const INFO_PLIST: &str = "Info.plist";

/// Placeholder app name shipped in `Info.plist`.
pub const DEFAULT_PLIST_APP_NAME: &str = "Chromium Embedded Framework";

/// Per-platform strategy for relocating extracted files.
pub trait InstallLayout: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Copy the runtime from `{extracted_root}/{folder_name}` into `app_dir`.
    ///
    /// Returns the number of files copied.
    fn install(
        &self,
        extracted_root: &Path,
        folder_name: &str,
        app_dir: &Path,
    ) -> LoaderResult<usize>;
}

/// `Release` and `Resources` copied flat into the app directory.
#[derive(Debug, Default)]
pub struct StandardLayout;

impl InstallLayout for StandardLayout {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn install(
        &self,
        extracted_root: &Path,
        folder_name: &str,
        app_dir: &Path,
    ) -> LoaderResult<usize> {
        let base = extracted_root.join(folder_name);
        let release = base.join(RELEASE_DIR);
        if !release.is_dir() {
            return Err(LoaderError::InstallFailed {
                path: release,
                reason: "archive has no Release folder".to_string(),
            });
        }

        let mut copied = copy_dir_recursive(&release, app_dir)?;

        let resources = base.join(RESOURCES_DIR);
        if resources.is_dir() {
            copied += copy_dir_recursive(&resources, app_dir)?;
        } else {
            debug!(path = %resources.display(), "No Resources folder in archive");
        }

        Ok(copied)
    }
}

/// Framework binary renamed to `libcef.dylib`, plus the bundle's
/// `Libraries` and `Resources` contents.
#[derive(Debug, Default)]
pub struct MacFrameworkLayout;

impl InstallLayout for MacFrameworkLayout {
    fn name(&self) -> &'static str {
        "macos-framework"
    }

    fn install(
        &self,
        extracted_root: &Path,
        folder_name: &str,
        app_dir: &Path,
    ) -> LoaderResult<usize> {
        let framework = extracted_root
            .join(folder_name)
            .join(RELEASE_DIR)
            .join(FRAMEWORK_BUNDLE);

        let binary = framework.join(FRAMEWORK_BINARY);
        if !binary.is_file() {
            return Err(LoaderError::InstallFailed {
                path: binary,
                reason: "framework bundle has no main binary".to_string(),
            });
        }

        fs::create_dir_all(app_dir).map_err(|e| LoaderError::CreateDirFailed {
            path: app_dir.to_path_buf(),
            source: e,
        })?;

        let library = app_dir.join(MAC_LIBRARY_NAME);
        fs::copy(&binary, &library).map_err(|e| LoaderError::WriteFailed {
            path: library.clone(),
            source: e,
        })?;
        let mut copied = 1;

        for folder in [FRAMEWORK_LIBRARIES_DIR, RESOURCES_DIR] {
            let source = framework.join(folder);
            if source.is_dir() {
                copied += copy_dir_recursive(&source, app_dir)?;
            } else {
                warn!(path = %source.display(), "Framework folder missing, skipping");
            }
        }

        Ok(copied)
    }
}

/// Pick the install layout for `platform`.
pub fn layout_for(platform: Platform) -> Box<dyn InstallLayout> {
    match platform {
        Platform::MacOsx => Box::new(MacFrameworkLayout),
        Platform::Windows | Platform::Linux => Box::new(StandardLayout),
    }
}

/// Copy the contents of `source` into `dest`, overwriting existing files.
///
/// Destination directories are created as needed. Returns the number of
/// files copied.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> LoaderResult<usize> {
    fs::create_dir_all(dest).map_err(|e| LoaderError::CreateDirFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut copied = 0;
    for entry in fs::read_dir(source).map_err(|e| LoaderError::ReadFailed {
        path: source.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| LoaderError::ReadFailed {
            path: source.to_path_buf(),
            source: e,
        })?;

        let source_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if source_path.is_dir() {
            copied += copy_dir_recursive(&source_path, &dest_path)?;
        } else {
            fs::copy(&source_path, &dest_path).map_err(|e| LoaderError::WriteFailed {
                path: dest_path,
                source: e,
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Replace the placeholder app name in `{app_dir}/Info.plist`.
///
/// Returns `false` without touching anything when the file does not exist.
pub fn apply_app_name(app_dir: &Path, app_name: &str) -> LoaderResult<bool> {
    let plist = app_dir.join(INFO_PLIST);
    if !plist.is_file() {
        debug!(path = %plist.display(), "No Info.plist to patch");
        return Ok(false);
    }

    let text = fs::read_to_string(&plist).map_err(|e| LoaderError::ReadFailed {
        path: plist.clone(),
        source: e,
    })?;
    let patched = text.replace(DEFAULT_PLIST_APP_NAME, app_name);
    fs::write(&plist, patched).map_err(|e| LoaderError::WriteFailed {
        path: plist.clone(),
        source: e,
    })?;

    info!(path = %plist.display(), app_name, "Patched Info.plist");
    Ok(true)
}

/// Patch `Info.plist` for macOS targets, logging instead of failing.
pub fn apply_app_name_best_effort(config: &LoaderConfig) {
    if config.platform != Platform::MacOsx {
        return;
    }

    let Some(app_name) = config.effective_app_name() else {
        warn!("No application name available, leaving Info.plist unchanged");
        return;
    };

    if let Err(e) = apply_app_name(&config.app_dir, &app_name) {
        error!(error = %e, "Failed to set application name in Info.plist");
    }
}
