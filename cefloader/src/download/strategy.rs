//! Download strategies for the runtime archive.
//!
//! The archive is fetched either as a set of ranged requests served by a
//! bounded pool of scoped worker threads ([`ParallelStrategy`]) or as one
//! streamed GET ([`SequentialStrategy`]). Both write the same destination
//! file; the orchestrator decides which one runs.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::progress::ProgressReporter;
use super::range::{plan_ranges, DownloadRange};
use crate::error::{LoaderError, LoaderResult};
use crate::http::HttpTransport;

/// Default timeout for a single ranged request.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Which path produced the downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    Parallel,
    Sequential,
}

impl std::fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadMode::Parallel => write!(f, "parallel"),
            DownloadMode::Sequential => write!(f, "sequential"),
        }
    }
}

/// A single download request.
#[derive(Debug, Clone, Copy)]
pub struct DownloadJob<'a> {
    /// Remote resource.
    pub url: &'a str,
    /// File receiving the complete resource. Truncated if it exists.
    pub dest: &'a Path,
    /// Directory holding chunk files while a parallel download runs.
    pub scratch_dir: &'a Path,
}

/// Strategy for fetching a resource into a file.
pub trait DownloadStrategy: Send + Sync {
    /// The mode this strategy reports in download outcomes.
    fn mode(&self) -> DownloadMode;

    /// Fetch `job.url` into `job.dest`, returning the number of bytes written.
    fn execute(
        &self,
        transport: &dyn HttpTransport,
        job: &DownloadJob<'_>,
        progress: &mut ProgressReporter<'_>,
    ) -> LoaderResult<u64>;
}

/// Single streamed GET into the destination.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DownloadStrategy for SequentialStrategy {
    fn mode(&self) -> DownloadMode {
        DownloadMode::Sequential
    }

    fn execute(
        &self,
        transport: &dyn HttpTransport,
        job: &DownloadJob<'_>,
        progress: &mut ProgressReporter<'_>,
    ) -> LoaderResult<u64> {
        info!(url = %job.url, "Starting sequential download");

        let file = File::create(job.dest).map_err(|e| LoaderError::WriteFailed {
            path: job.dest.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);

        let mut on_progress = |done: u64, total: Option<u64>| {
            if let Some(total) = total {
                progress.report(done, total);
            }
        };
        let written = transport.get_streamed(job.url, &mut writer, &mut on_progress)?;

        writer.flush().map_err(|e| LoaderError::WriteFailed {
            path: job.dest.to_path_buf(),
            source: e,
        })?;

        Ok(written)
    }
}

/// Ranged download over a bounded pool of scoped worker threads.
///
/// Workers pull ranges from a shared queue, write each one to its own chunk
/// file in the scratch directory, and record it in a map keyed by range
/// start. Once every worker has joined, the chunks are appended to the
/// destination in ascending offset order.
#[derive(Debug)]
pub struct ParallelStrategy {
    /// Maximum number of simultaneous ranged requests.
    pub workers: usize,
    /// Timeout for each ranged request.
    pub chunk_timeout: Duration,
}

impl ParallelStrategy {
    /// Create a new parallel strategy. A worker count of zero is treated as one.
    pub fn new(workers: usize, chunk_timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            chunk_timeout,
        }
    }

    fn fetch_chunk(
        &self,
        transport: &dyn HttpTransport,
        job: &DownloadJob<'_>,
        range: DownloadRange,
    ) -> LoaderResult<PathBuf> {
        let chunk = tempfile::Builder::new()
            .prefix("chunk-")
            .tempfile_in(job.scratch_dir)
            .map_err(|e| LoaderError::WriteFailed {
                path: job.scratch_dir.to_path_buf(),
                source: e,
            })?;

        // The temp file removes itself if anything below fails.
        let mut writer = BufWriter::new(chunk.as_file());
        transport.get_range(job.url, range, self.chunk_timeout, &mut writer)?;
        writer.flush().map_err(|e| LoaderError::WriteFailed {
            path: chunk.path().to_path_buf(),
            source: e,
        })?;
        drop(writer);

        let (_, path) = chunk.keep().map_err(|e| LoaderError::WriteFailed {
            path: job.scratch_dir.to_path_buf(),
            source: e.error,
        })?;

        debug!(range = %range, path = %path.display(), "Chunk complete");
        Ok(path)
    }
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(workers, DEFAULT_CHUNK_TIMEOUT)
    }
}

impl DownloadStrategy for ParallelStrategy {
    fn mode(&self) -> DownloadMode {
        DownloadMode::Parallel
    }

    fn execute(
        &self,
        transport: &dyn HttpTransport,
        job: &DownloadJob<'_>,
        progress: &mut ProgressReporter<'_>,
    ) -> LoaderResult<u64> {
        let content_length = transport.content_length(job.url)?;
        let ranges = plan_ranges(content_length, self.workers);
        if ranges.is_empty() {
            return Err(LoaderError::DownloadFailed {
                url: job.url.to_string(),
                reason: "resource is empty, nothing to fetch by range".to_string(),
            });
        }

        let worker_count = self.workers.min(ranges.len());
        let size_mb = content_length as f64 / 1_048_576.0;
        info!(
            url = %job.url,
            size_mb,
            ranges = ranges.len(),
            workers = worker_count,
            "Starting parallel download"
        );

        let chunks: DashMap<u64, PathBuf> = DashMap::with_capacity(ranges.len());
        let next = AtomicUsize::new(0);
        let aborted = AtomicBool::new(false);
        let first_error: Mutex<Option<LoaderError>> = Mutex::new(None);

        thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| loop {
                    if aborted.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(range) = ranges.get(index).copied() else {
                        break;
                    };

                    match self.fetch_chunk(transport, job, range) {
                        Ok(path) => {
                            chunks.insert(range.start, path);
                        }
                        Err(e) => {
                            warn!(range = %range, error = %e, "Chunk failed");
                            aborted.store(true, Ordering::SeqCst);
                            let mut slot = first_error.lock().unwrap_or_else(|p| p.into_inner());
                            slot.get_or_insert(e);
                            break;
                        }
                    }
                });
            }
        });

        let failure = first_error
            .into_inner()
            .unwrap_or_else(|p| p.into_inner());
        let chunks: Vec<(u64, PathBuf)> = chunks.into_iter().collect();

        if let Some(e) = failure {
            discard_chunks(&chunks);
            return Err(e);
        }

        if chunks.len() != ranges.len() {
            discard_chunks(&chunks);
            return Err(LoaderError::DownloadFailed {
                url: job.url.to_string(),
                reason: format!("{} of {} chunks completed", chunks.len(), ranges.len()),
            });
        }

        let written = merge_chunks(chunks, job.dest)?;
        if written != content_length {
            return Err(LoaderError::DownloadFailed {
                url: job.url.to_string(),
                reason: format!(
                    "reassembled {} bytes, expected {}",
                    written, content_length
                ),
            });
        }

        progress.report(written, content_length);
        Ok(written)
    }
}

/// Append chunk files to `dest` in ascending start-offset order.
///
/// The order in which chunks appear in `chunks` does not matter. Each chunk
/// file is deleted as soon as it has been appended; on failure the remaining
/// chunk files are deleted too. Returns the total number of bytes written.
pub fn merge_chunks(mut chunks: Vec<(u64, PathBuf)>, dest: &Path) -> LoaderResult<u64> {
    chunks.sort_by_key(|(start, _)| *start);

    let file = File::create(dest).map_err(|e| LoaderError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;

    for (index, (start, path)) in chunks.iter().enumerate() {
        match append_chunk(&mut writer, path, dest) {
            Ok(bytes) => {
                debug!(start, bytes, "Merged chunk");
                written += bytes;
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "Failed to delete merged chunk");
                }
            }
            Err(e) => {
                discard_chunks(&chunks[index..]);
                return Err(e);
            }
        }
    }

    writer.flush().map_err(|e| LoaderError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(written)
}

fn append_chunk(writer: &mut impl Write, chunk: &Path, dest: &Path) -> LoaderResult<u64> {
    let mut reader = File::open(chunk).map_err(|e| LoaderError::ReadFailed {
        path: chunk.to_path_buf(),
        source: e,
    })?;
    io::copy(&mut reader, writer).map_err(|e| LoaderError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    })
}

fn discard_chunks(chunks: &[(u64, PathBuf)]) {
    for (_, path) in chunks {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to delete chunk file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ProgressThrottle;
    use crate::http::tests::MockTransport;
    use proptest::prelude::*;
    use tempfile::TempDir;

    const URL: &str = "http://cdn/archive.tar.bz2";

    fn body(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn run(
        strategy: &dyn DownloadStrategy,
        transport: &MockTransport,
        temp: &TempDir,
    ) -> LoaderResult<u64> {
        let scratch = temp.path().join("chunks");
        fs::create_dir_all(&scratch).unwrap();
        let dest = temp.path().join("archive.tar.bz2");
        let job = DownloadJob {
            url: URL,
            dest: &dest,
            scratch_dir: &scratch,
        };
        let mut throttle = ProgressThrottle::new();
        let mut reporter = ProgressReporter::new("Download", &mut throttle);
        strategy.execute(transport, &job, &mut reporter)
    }

    fn scratch_entries(temp: &TempDir) -> usize {
        fs::read_dir(temp.path().join("chunks")).unwrap().count()
    }

    #[test]
    fn test_parallel_strategy_new() {
        let strategy = ParallelStrategy::new(8, Duration::from_secs(60));
        assert_eq!(strategy.workers, 8);
        assert_eq!(strategy.chunk_timeout, Duration::from_secs(60));
        assert_eq!(strategy.mode(), DownloadMode::Parallel);
    }

    #[test]
    fn test_parallel_strategy_min_workers() {
        let strategy = ParallelStrategy::new(0, Duration::from_secs(60));
        assert_eq!(strategy.workers, 1);
    }

    #[test]
    fn test_parallel_strategy_default_timeout() {
        let strategy = ParallelStrategy::default();
        assert_eq!(strategy.chunk_timeout, Duration::from_secs(600));
        assert!(strategy.workers >= 1);
    }

    #[test]
    fn test_parallel_download_reassembles_body() {
        let temp = TempDir::new().unwrap();
        let data = body(10_007);
        let transport = MockTransport::default().with_body(URL, data.clone());

        let written = run(&ParallelStrategy::new(4, DEFAULT_CHUNK_TIMEOUT), &transport, &temp)
            .unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(fs::read(temp.path().join("archive.tar.bz2")).unwrap(), data);
        assert_eq!(transport.range_requests.load(Ordering::SeqCst), 4);
        assert_eq!(scratch_entries(&temp), 0);
    }

    #[test]
    fn test_parallel_download_more_workers_than_bytes() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::default().with_body(URL, b"abc".to_vec());

        let written = run(&ParallelStrategy::new(16, DEFAULT_CHUNK_TIMEOUT), &transport, &temp)
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(transport.range_requests.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_parallel_download_missing_content_length() {
        let temp = TempDir::new().unwrap();
        let mut transport = MockTransport::default().with_body(URL, body(100));
        transport.omit_content_length = true;

        let result = run(&ParallelStrategy::new(4, DEFAULT_CHUNK_TIMEOUT), &transport, &temp);

        assert!(matches!(result, Err(LoaderError::Transport(_))));
        assert_eq!(transport.range_requests.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parallel_download_failed_chunk_cleans_scratch() {
        let temp = TempDir::new().unwrap();
        let mut transport = MockTransport::default().with_body(URL, body(1000));
        transport.fail_range_starting_at = Some(500);

        let result = run(&ParallelStrategy::new(4, DEFAULT_CHUNK_TIMEOUT), &transport, &temp);

        assert!(result.is_err());
        assert_eq!(scratch_entries(&temp), 0);
    }

    #[test]
    fn test_parallel_download_empty_resource() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::default().with_body(URL, Vec::new());

        let result = run(&ParallelStrategy::new(4, DEFAULT_CHUNK_TIMEOUT), &transport, &temp);

        assert!(matches!(result, Err(LoaderError::DownloadFailed { .. })));
    }

    #[test]
    fn test_sequential_download_truncates_partial_output() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("archive.tar.bz2");
        fs::write(&dest, vec![0xFFu8; 50_000]).unwrap();

        let data = body(4096);
        let transport = MockTransport::default().with_body(URL, data.clone());

        let written = run(&SequentialStrategy::new(), &transport, &temp).unwrap();

        assert_eq!(written, 4096);
        assert_eq!(fs::read(&dest).unwrap(), data);
        assert_eq!(transport.streamed_requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequential_download_not_found() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::default();

        let result = run(&SequentialStrategy::new(), &transport, &temp);

        assert!(matches!(result, Err(LoaderError::Transport(_))));
    }

    #[test]
    fn test_merge_deletes_chunks() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::write(&a, b"hello ").unwrap();
        fs::write(&b, b"world").unwrap();

        let dest = temp.path().join("out");
        let written = merge_chunks(vec![(6, b.clone()), (0, a.clone())], &dest).unwrap();

        assert_eq!(written, 11);
        assert_eq!(fs::read(&dest).unwrap(), b"hello world");
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_merge_missing_chunk_discards_rest() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("present");
        fs::write(&present, b"tail").unwrap();

        let dest = temp.path().join("out");
        let result = merge_chunks(
            vec![(0, temp.path().join("missing")), (10, present.clone())],
            &dest,
        );

        assert!(matches!(result, Err(LoaderError::ReadFailed { .. })));
        assert!(!present.exists());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_merge_is_independent_of_completion_order(
            (len, workers, order) in (1usize..4096, 1usize..12)
                .prop_flat_map(|(len, workers)| {
                    let count = workers.min(len);
                    (
                        Just(len),
                        Just(workers),
                        Just((0..count).collect::<Vec<_>>()).prop_shuffle(),
                    )
                })
        ) {
            let temp = TempDir::new().unwrap();
            let data = body(len);
            let ranges = plan_ranges(len as u64, workers);

            let chunks: Vec<(u64, PathBuf)> = order
                .iter()
                .map(|&i| {
                    let range = ranges[i];
                    let path = temp.path().join(format!("chunk-{}", i));
                    fs::write(&path, &data[range.start as usize..=range.end as usize]).unwrap();
                    (range.start, path)
                })
                .collect();

            let dest = temp.path().join("merged");
            let written = merge_chunks(chunks, &dest).unwrap();

            prop_assert_eq!(written, len as u64);
            prop_assert_eq!(fs::read(&dest).unwrap(), data);
        }
    }
}
