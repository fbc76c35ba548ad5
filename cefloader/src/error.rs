//! Error types for the runtime loader.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::http::TransportError;
use crate::index::ResolutionMiss;

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Errors that can occur while fetching and installing a CEF runtime.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a file or directory.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The platform/architecture pair has no published CEF builds.
    #[error("unsupported platform: {platform} on {architecture}")]
    UnsupportedPlatform {
        platform: String,
        architecture: String,
    },

    /// No archive matched the requested build in the index.
    #[error("no CEF archive for {platform} {build}: {reason}")]
    ArchiveNotFound {
        platform: String,
        build: String,
        reason: ResolutionMiss,
    },

    /// An HTTP request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Both the parallel and the sequential download failed.
    #[error("failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The downloaded archive does not have the size declared by the index.
    #[error("size mismatch for {filename}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        filename: String,
        expected: u64,
        actual: u64,
    },

    /// Checksum verification failed.
    #[error("checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// Archive decompression or extraction failed.
    #[error("failed to extract {}: {reason}", path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// Copying the extracted runtime into place failed.
    #[error("failed to install from {}: {reason}", path.display())]
    InstallFailed { path: PathBuf, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
