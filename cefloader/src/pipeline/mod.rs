//! Install pipeline.
//!
//! Sequences resolution, download, verification, decompression and
//! installation for one CEF runtime, timing each phase:
//!
//! ```text
//! Idle → ResolvingUrl → Downloading → Verifying → Decompressing → Installing → Done
//!            └──────────────┴─────────────┴─────────────┴──────────────┴──→ Failed
//!                                                                  (then) Cleanup
//! ```
//!
//! Temporary files belong to a [`PipelineContext`], which removes them when
//! the run ends, whatever the outcome.

mod context;

pub use context::{PipelineContext, ResolvedArchive};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::config::LoaderConfig;
use crate::download::{verify_archive, ChunkedDownloader, DownloadMode, PercentCallback};
use crate::error::{LoaderError, LoaderResult};
use crate::extractor::Bz2TarExtractor;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::index::{ArchiveResolver, BuildIndexClient, ResolutionMiss};
use crate::installer::{apply_app_name_best_effort, layout_for, InstallLayout};

/// Receives stage transitions (with percent 0) and throttled percentages.
pub type InstallProgressCallback = Box<dyn Fn(InstallStage, u32) + Send + Sync>;

/// Installation stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Idle,
    ResolvingUrl,
    Downloading,
    Verifying,
    Decompressing,
    Installing,
    Done,
    Failed,
    Cleanup,
}

impl InstallStage {
    /// Human-readable name for the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ResolvingUrl => "Resolving download URL",
            Self::Downloading => "Downloading",
            Self::Verifying => "Verifying",
            Self::Decompressing => "Decompressing",
            Self::Installing => "Installing",
            Self::Done => "Done",
            Self::Failed => "Failed",
            Self::Cleanup => "Cleaning up",
        }
    }

    /// Whether the run has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock duration of each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub resolve: Duration,
    pub download: Duration,
    pub verify: Duration,
    pub decompress: Duration,
    pub install: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.resolve + self.download + self.verify + self.decompress + self.install
    }
}

/// Result of a successful install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub archive_name: String,
    pub download_url: String,
    pub bytes_downloaded: u64,
    pub download_mode: DownloadMode,
    /// Tar entries unpacked.
    pub files_extracted: usize,
    /// Files copied into the app directory.
    pub files_installed: usize,
    pub timings: PhaseTimings,
}

/// Fetches and installs one CEF runtime.
pub struct RuntimeInstaller<R: ArchiveResolver, T: HttpTransport> {
    config: LoaderConfig,
    resolver: R,
    downloader: ChunkedDownloader<T>,
    extractor: Bz2TarExtractor,
    layout: Box<dyn InstallLayout>,
    on_progress: Option<InstallProgressCallback>,
}

impl RuntimeInstaller<BuildIndexClient<ReqwestTransport>, ReqwestTransport> {
    /// Installer talking to the configured CDN over HTTPS.
    pub fn from_config(config: LoaderConfig) -> LoaderResult<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: HttpTransport> RuntimeInstaller<BuildIndexClient<T>, T> {
    /// Installer using the build index client over `transport`.
    pub fn with_transport(config: LoaderConfig, transport: Arc<T>) -> Self {
        let resolver =
            BuildIndexClient::with_base_url(Arc::clone(&transport), config.cdn_base_url.clone());
        Self::new(config, resolver, transport)
    }
}

impl<R: ArchiveResolver, T: HttpTransport> RuntimeInstaller<R, T> {
    /// Create an installer from explicit parts.
    pub fn new(config: LoaderConfig, resolver: R, transport: Arc<T>) -> Self {
        let downloader =
            ChunkedDownloader::with_settings(transport, config.workers, config.chunk_timeout);
        let layout = layout_for(config.platform);
        Self {
            config,
            resolver,
            downloader,
            extractor: Bz2TarExtractor::new(),
            layout,
            on_progress: None,
        }
    }

    /// Report stages and progress to `callback`.
    pub fn with_progress(mut self, callback: InstallProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Resolve the archive and its download URL without downloading anything.
    pub fn resolve(&self) -> LoaderResult<ResolvedArchive> {
        let platform = self.config.platform_identifier()?;
        let not_found = |reason: ResolutionMiss| LoaderError::ArchiveNotFound {
            platform: platform.to_string(),
            build: self.config.build.to_string(),
            reason,
        };

        let descriptor = self
            .resolver
            .resolve_archive(
                self.config.platform,
                self.config.architecture,
                &self.config.build,
            )
            .map_err(not_found)?;

        if descriptor.name.trim().is_empty() {
            return Err(not_found(ResolutionMiss::NoMinimalArtifact));
        }

        let url = self.resolver.download_url(&descriptor.name);
        Ok(ResolvedArchive { descriptor, url })
    }

    /// Run the whole pipeline.
    ///
    /// Temporary files are removed before this returns, on success and on
    /// failure. On macOS targets the `Info.plist` app name is patched after a
    /// successful install (failures there are logged, not returned).
    ///
    /// # Returns
    ///
    /// An [`InstallReport`] with file counts and per-phase timings.
    ///
    /// # Errors
    ///
    /// Returns the first error of the failing phase:
    /// - `InvalidConfig` or `UnsupportedPlatform` before anything starts
    /// - `ArchiveNotFound` when the index has no matching build or artifact
    /// - `DownloadFailed` when both download paths fail
    /// - `SizeMismatch` or `ChecksumMismatch` from verification
    /// - `ExtractionFailed` or `InstallFailed` from the later phases
    pub fn install(&self) -> LoaderResult<InstallReport> {
        self.config.validate()?;
        self.enter(InstallStage::Idle);

        let mut context =
            PipelineContext::new(&self.config.staging_dir, self.config.platform_identifier()?)?;

        let result = self.run(&mut context);
        match &result {
            Ok(report) => {
                self.enter(InstallStage::Done);
                info!(
                    archive = %report.archive_name,
                    mode = %report.download_mode,
                    files = report.files_installed,
                    total_ms = report.timings.total().as_millis() as u64,
                    "CEF runtime installed"
                );
            }
            Err(e) => {
                self.enter(InstallStage::Failed);
                let archive = context.archive().map_or("<unresolved>", ResolvedArchive::name);
                error!(archive, error = %e, "CEF runtime install failed");
            }
        }

        self.enter(InstallStage::Cleanup);
        drop(context);

        if result.is_ok() {
            apply_app_name_best_effort(&self.config);
        }
        result
    }

    fn run(&self, context: &mut PipelineContext) -> LoaderResult<InstallReport> {
        let mut timings = PhaseTimings::default();

        self.enter(InstallStage::ResolvingUrl);
        let started = Instant::now();
        let archive = self.resolve()?;
        timings.resolve = finish("Resolving download URL", started);
        info!(archive = %archive.name(), url = %archive.url, "Download URL resolved");
        context.set_archive(archive.clone());

        self.enter(InstallStage::Downloading);
        let started = Instant::now();
        context.throttle_mut().reset();
        let outcome = {
            let callback = self.percent_callback(InstallStage::Downloading);
            let compressed = context.compressed_path().to_path_buf();
            let scratch = context.scratch_dir().to_path_buf();
            self.downloader.download(
                &archive.url,
                &compressed,
                &scratch,
                context.throttle_mut(),
                callback.as_ref().map(|cb| cb as PercentCallback<'_>),
            )?
        };
        timings.download = finish("Download", started);

        self.enter(InstallStage::Verifying);
        let started = Instant::now();
        if self.config.verify_checksum {
            verify_archive(
                context.compressed_path(),
                archive.descriptor.size,
                &archive.descriptor.sha1,
            )?;
        } else {
            debug!("Archive verification disabled");
        }
        timings.verify = finish("Verifying archive", started);

        self.enter(InstallStage::Decompressing);
        let started = Instant::now();
        context.throttle_mut().reset();
        let files_extracted = {
            let callback = self.percent_callback(InstallStage::Decompressing);
            let compressed = context.compressed_path().to_path_buf();
            let tar_path = context.tar_path().to_path_buf();
            let extraction_dir = context.extraction_dir().to_path_buf();
            self.extractor.extract(
                &compressed,
                &tar_path,
                &extraction_dir,
                context.throttle_mut(),
                callback.as_ref().map(|cb| cb as PercentCallback<'_>),
            )?
        };
        timings.decompress = finish("Decompressing archive", started);

        self.enter(InstallStage::Installing);
        let started = Instant::now();
        debug!(layout = self.layout.name(), "Installing runtime files");
        let files_installed = self.layout.install(
            context.extraction_dir(),
            &archive.folder_name(),
            &self.config.app_dir,
        )?;
        timings.install = finish("Copying files", started);
        debug!(
            app_dir = %self.config.app_dir.display(),
            files = files_installed,
            "App directory ready"
        );

        Ok(InstallReport {
            archive_name: archive.name().to_string(),
            download_url: archive.url,
            bytes_downloaded: outcome.bytes,
            download_mode: outcome.mode,
            files_extracted,
            files_installed,
            timings,
        })
    }

    fn enter(&self, stage: InstallStage) {
        debug!(stage = %stage, "Entering stage");
        if let Some(cb) = &self.on_progress {
            cb(stage, 0);
        }
    }

    fn percent_callback(&self, stage: InstallStage) -> Option<impl Fn(u32) + Send + Sync + '_> {
        self.on_progress
            .as_ref()
            .map(move |cb| move |percent: u32| cb(stage, percent))
    }
}

fn finish(phase: &str, started: Instant) -> Duration {
    let elapsed = started.elapsed();
    info!("{} took {}ms", phase, elapsed.as_millis());
    elapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_stage_name() {
        assert_eq!(InstallStage::ResolvingUrl.name(), "Resolving download URL");
        assert_eq!(InstallStage::Downloading.name(), "Downloading");
        assert_eq!(InstallStage::Cleanup.name(), "Cleaning up");
        assert_eq!(InstallStage::Done.to_string(), "Done");
    }

    #[test]
    fn test_terminal_stages() {
        assert!(InstallStage::Done.is_terminal());
        assert!(InstallStage::Failed.is_terminal());
        assert!(!InstallStage::Installing.is_terminal());
        assert!(!InstallStage::Cleanup.is_terminal());
    }

    #[test]
    fn test_phase_timings_total() {
        let timings = PhaseTimings {
            resolve: Duration::from_millis(1),
            download: Duration::from_millis(20),
            verify: Duration::from_millis(3),
            decompress: Duration::from_millis(40),
            install: Duration::from_millis(5),
        };
        assert_eq!(timings.total(), Duration::from_millis(69));
    }
}
