//! Download orchestration: parallel first, sequential fallback.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::progress::{PercentCallback, ProgressReporter, ProgressThrottle};
use super::strategy::{
    DownloadJob, DownloadMode, DownloadStrategy, ParallelStrategy, SequentialStrategy,
};
use crate::error::{LoaderError, LoaderResult};
use crate::http::HttpTransport;

/// Result of a completed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Size of the downloaded file in bytes.
    pub bytes: u64,
    /// Path that produced the file.
    pub mode: DownloadMode,
}

/// Fetches the runtime archive with ranged requests, falling back to a
/// single streamed GET when the ranged path fails for any reason.
pub struct ChunkedDownloader<T: HttpTransport> {
    transport: Arc<T>,
    parallel: ParallelStrategy,
    sequential: SequentialStrategy,
}

impl<T: HttpTransport> ChunkedDownloader<T> {
    /// Create a downloader with host-parallelism workers and the default chunk timeout.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            parallel: ParallelStrategy::default(),
            sequential: SequentialStrategy::new(),
        }
    }

    /// Create a downloader with custom settings.
    pub fn with_settings(transport: Arc<T>, workers: usize, chunk_timeout: Duration) -> Self {
        Self {
            transport,
            parallel: ParallelStrategy::new(workers, chunk_timeout),
            sequential: SequentialStrategy::new(),
        }
    }

    pub fn workers(&self) -> usize {
        self.parallel.workers
    }

    pub fn chunk_timeout(&self) -> Duration {
        self.parallel.chunk_timeout
    }

    /// Fetch `url` into `dest` with concurrent ranged requests.
    ///
    /// Chunk files live in `scratch_dir` only until they are merged. On
    /// failure no chunk files are left behind.
    pub fn download_parallel(
        &self,
        url: &str,
        dest: &Path,
        scratch_dir: &Path,
    ) -> LoaderResult<u64> {
        let job = DownloadJob {
            url,
            dest,
            scratch_dir,
        };
        let mut throttle = ProgressThrottle::new();
        let mut reporter = ProgressReporter::new("Download", &mut throttle);
        self.parallel.execute(self.transport.as_ref(), &job, &mut reporter)
    }

    /// Fetch `url` into `dest` with one streamed GET, truncating partial output.
    pub fn download_sequential(
        &self,
        url: &str,
        dest: &Path,
        throttle: &mut ProgressThrottle,
        callback: Option<PercentCallback<'_>>,
    ) -> LoaderResult<u64> {
        let job = DownloadJob {
            url,
            dest,
            scratch_dir: dest.parent().unwrap_or(Path::new(".")),
        };
        let mut reporter = ProgressReporter::new("Download", throttle).with_callback(callback);
        self.sequential.execute(self.transport.as_ref(), &job, &mut reporter)
    }

    /// Fetch `url` into `dest`, trying the parallel path first.
    ///
    /// Any parallel failure (missing `Content-Length`, a failed or timed out
    /// chunk, a merge error) is logged and demoted to a sequential retry.
    ///
    /// # Arguments
    ///
    /// * `url` - Archive URL
    /// * `dest` - Final file path; replaced if it exists
    /// * `scratch_dir` - Directory for chunk files during the parallel attempt
    /// * `throttle` - Watermark for the sequential attempt's progress
    /// * `callback` - Optional receiver of throttled percentages
    ///
    /// # Errors
    ///
    /// Returns `DownloadFailed` carrying both reasons when the parallel and the
    /// sequential attempts fail.
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        scratch_dir: &Path,
        throttle: &mut ProgressThrottle,
        callback: Option<PercentCallback<'_>>,
    ) -> LoaderResult<DownloadOutcome> {
        let parallel_error = match self.download_parallel(url, dest, scratch_dir) {
            Ok(bytes) => {
                if let Some(cb) = callback {
                    cb(100);
                }
                return Ok(DownloadOutcome {
                    bytes,
                    mode: self.parallel.mode(),
                });
            }
            Err(e) => e,
        };

        warn!(
            url = %url,
            error = %parallel_error,
            "Parallel download failed, falling back to sequential download"
        );

        match self.download_sequential(url, dest, throttle, callback) {
            Ok(bytes) => {
                info!(url = %url, bytes, "Sequential download complete");
                Ok(DownloadOutcome {
                    bytes,
                    mode: self.sequential.mode(),
                })
            }
            Err(sequential_error) => Err(LoaderError::DownloadFailed {
                url: url.to_string(),
                reason: format!(
                    "parallel: {}; sequential: {}",
                    parallel_error, sequential_error
                ),
            }),
        }
    }
}

impl<T: HttpTransport> std::fmt::Debug for ChunkedDownloader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedDownloader")
            .field("parallel", &self.parallel)
            .field("sequential", &self.sequential)
            .finish()
    }
}
