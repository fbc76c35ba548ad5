//! Two-stage archive extraction: bzip2 to a tar file, then tar to a directory.
//!
//! The decompressed tar is written to disk first so the (slow) bzip2 stage
//! can report progress against the compressed size, and the unpack stage
//! reads a plain seekable file.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use bzip2::read::BzDecoder;
use tracing::{debug, info, warn};

use crate::download::{PercentCallback, ProgressReporter, ProgressThrottle};
use crate::error::{LoaderError, LoaderResult};

/// Buffer size for the decompression loop (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Counts bytes pulled from the compressed file.
struct CountingReader<R> {
    inner: R,
    consumed: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        Ok(n)
    }
}

/// Extracts `.tar.bz2` archives.
#[derive(Debug, Default)]
pub struct Bz2TarExtractor;

impl Bz2TarExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Decompress `compressed` into `tar_path`, returning the tar size.
    ///
    /// Progress is the fraction of compressed bytes consumed, passed
    /// through `throttle`.
    pub fn decompress(
        &self,
        compressed: &Path,
        tar_path: &Path,
        throttle: &mut ProgressThrottle,
        callback: Option<PercentCallback<'_>>,
    ) -> LoaderResult<u64> {
        let input = File::open(compressed).map_err(|e| LoaderError::ReadFailed {
            path: compressed.to_path_buf(),
            source: e,
        })?;
        let total = input
            .metadata()
            .map_err(|e| LoaderError::ReadFailed {
                path: compressed.to_path_buf(),
                source: e,
            })?
            .len();

        let output = File::create(tar_path).map_err(|e| LoaderError::WriteFailed {
            path: tar_path.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(output);

        let mut decoder = BzDecoder::new(CountingReader {
            inner: input,
            consumed: 0,
        });
        let mut reporter =
            ProgressReporter::new("Decompress", throttle).with_callback(callback);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let n = decoder
                .read(&mut buffer)
                .map_err(|e| LoaderError::ExtractionFailed {
                    path: compressed.to_path_buf(),
                    reason: format!("bzip2 stream error: {}", e),
                })?;
            if n == 0 {
                break;
            }

            writer
                .write_all(&buffer[..n])
                .map_err(|e| LoaderError::WriteFailed {
                    path: tar_path.to_path_buf(),
                    source: e,
                })?;
            written += n as u64;
            reporter.report(decoder.get_ref().consumed, total);
        }

        writer.flush().map_err(|e| LoaderError::WriteFailed {
            path: tar_path.to_path_buf(),
            source: e,
        })?;
        reporter.report(total, total);

        debug!(tar = %tar_path.display(), bytes = written, "Decompressed archive");
        Ok(written)
    }

    /// Unpack every entry of `tar_path` into `destination`.
    ///
    /// Returns the number of entries written. Entries whose paths would
    /// escape `destination` are skipped with a warning.
    pub fn unpack(&self, tar_path: &Path, destination: &Path) -> LoaderResult<usize> {
        fs::create_dir_all(destination).map_err(|e| LoaderError::CreateDirFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;

        let mut file = File::open(tar_path).map_err(|e| LoaderError::ReadFailed {
            path: tar_path.to_path_buf(),
            source: e,
        })?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| LoaderError::ReadFailed {
                path: tar_path.to_path_buf(),
                source: e,
            })?;

        let extraction_failed = |reason: String| LoaderError::ExtractionFailed {
            path: tar_path.to_path_buf(),
            reason,
        };

        let mut archive = tar::Archive::new(BufReader::new(file));
        archive.set_overwrite(true);
        archive.set_preserve_permissions(true);

        let entries = archive
            .entries()
            .map_err(|e| extraction_failed(format!("unreadable tar: {}", e)))?;

        let mut unpacked = 0usize;
        let mut skipped = 0usize;
        for entry in entries {
            let mut entry =
                entry.map_err(|e| extraction_failed(format!("corrupt entry: {}", e)))?;
            let path = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "<invalid path>".to_string());

            let written = entry
                .unpack_in(destination)
                .map_err(|e| extraction_failed(format!("failed to unpack {}: {}", path, e)))?;

            if written {
                debug!(entry = %path, "Extracted");
                unpacked += 1;
            } else {
                warn!(entry = %path, "Skipped entry outside extraction directory");
                skipped += 1;
            }
        }

        info!(
            destination = %destination.display(),
            entries = unpacked,
            skipped,
            "Unpacked archive"
        );
        Ok(unpacked)
    }

    /// Decompress `compressed` to `tar_path`, then unpack it into `destination`.
    ///
    /// Returns the number of entries unpacked.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionFailed` for a corrupt bzip2 stream or tar file.
    pub fn extract(
        &self,
        compressed: &Path,
        tar_path: &Path,
        destination: &Path,
        throttle: &mut ProgressThrottle,
        callback: Option<PercentCallback<'_>>,
    ) -> LoaderResult<usize> {
        self.decompress(compressed, tar_path, throttle, callback)?;
        self.unpack(tar_path, destination)
    }
}
