//! Per-run state and temporary file ownership.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::download::ProgressThrottle;
use crate::error::{LoaderError, LoaderResult};
use crate::index::ArchiveDescriptor;
use crate::platform::PlatformIdentifier;

/// An archive resolved from the build index, with its download URL.
///
/// Name, URL and folder name all come from one resolution, so they always
/// describe the same archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArchive {
    pub descriptor: ArchiveDescriptor,
    pub url: String,
}

impl ResolvedArchive {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Top-level directory inside the archive.
    pub fn folder_name(&self) -> String {
        self.descriptor.folder_name()
    }
}

/// State owned by exactly one install run.
///
/// Every temporary path lives in a private run directory under the staging
/// directory. Dropping the context deletes each of them independently and
/// logs (never propagates) failures.
#[derive(Debug)]
pub struct PipelineContext {
    platform: PlatformIdentifier,
    compressed_path: PathBuf,
    tar_path: PathBuf,
    extraction_dir: PathBuf,
    scratch_dir: PathBuf,
    archive: Option<ResolvedArchive>,
    throttle: ProgressThrottle,
    // Declared last so it is removed after the explicit cleanup in `Drop`.
    run_dir: TempDir,
}

impl PipelineContext {
    /// Create the run directory under `staging_dir` and its sub-directories.
    pub fn new(staging_dir: &Path, platform: PlatformIdentifier) -> LoaderResult<Self> {
        fs::create_dir_all(staging_dir).map_err(|e| LoaderError::CreateDirFailed {
            path: staging_dir.to_path_buf(),
            source: e,
        })?;

        let run_dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(staging_dir)
            .map_err(|e| LoaderError::CreateDirFailed {
                path: staging_dir.to_path_buf(),
                source: e,
            })?;

        let root = run_dir.path();
        let context = Self {
            compressed_path: root.join("archive.tar.bz2"),
            tar_path: root.join("archive.tar"),
            extraction_dir: root.join("extracted"),
            scratch_dir: root.join("chunks"),
            platform,
            archive: None,
            throttle: ProgressThrottle::new(),
            run_dir,
        };

        for dir in [&context.extraction_dir, &context.scratch_dir] {
            fs::create_dir_all(dir).map_err(|e| LoaderError::CreateDirFailed {
                path: dir.clone(),
                source: e,
            })?;
        }

        debug!(run_dir = %context.run_dir.path().display(), "Created pipeline context");
        Ok(context)
    }

    pub fn platform(&self) -> &PlatformIdentifier {
        &self.platform
    }

    /// Downloaded `.tar.bz2` file.
    pub fn compressed_path(&self) -> &Path {
        &self.compressed_path
    }

    /// Decompressed `.tar` file.
    pub fn tar_path(&self) -> &Path {
        &self.tar_path
    }

    /// Directory the tar is unpacked into.
    pub fn extraction_dir(&self) -> &Path {
        &self.extraction_dir
    }

    /// Directory for parallel download chunk files.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn run_dir(&self) -> &Path {
        self.run_dir.path()
    }

    /// The archive this run is installing, once resolved.
    pub fn archive(&self) -> Option<&ResolvedArchive> {
        self.archive.as_ref()
    }

    pub fn set_archive(&mut self, archive: ResolvedArchive) {
        self.archive = Some(archive);
    }

    pub fn throttle_mut(&mut self) -> &mut ProgressThrottle {
        &mut self.throttle
    }

    /// Delete every temporary path. Safe to call more than once.
    pub fn cleanup(&mut self) {
        remove_file_logged(&self.compressed_path);
        remove_file_logged(&self.tar_path);
        remove_dir_logged(&self.scratch_dir);
        remove_dir_logged(&self.extraction_dir);
    }
}

impl Drop for PipelineContext {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_file_logged(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed temporary file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary file"),
    }
}

fn remove_dir_logged(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "Removed temporary directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary directory"),
    }
}
