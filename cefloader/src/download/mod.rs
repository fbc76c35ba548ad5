//! Archive download.
//!
//! - Byte-range planning (`range`)
//! - Throttled progress reporting (`progress`)
//! - Parallel and sequential download strategies (`strategy`)
//! - Fallback orchestration (`orchestrator`)
//! - Size and SHA-1 verification (`checksum`)
//!
//! # Architecture
//!
//! ```text
//! ChunkedDownloader (orchestrator)
//!         │
//!         ├── ParallelStrategy ── plan_ranges ── scoped workers ── merge_chunks
//!         │
//!         └── SequentialStrategy (fallback) ── ProgressReporter
//! ```

mod checksum;
mod orchestrator;
mod progress;
mod range;
mod strategy;

pub use checksum::{calculate_file_sha1, verify_archive};
pub use orchestrator::{ChunkedDownloader, DownloadOutcome};
pub use progress::{
    percent_of, PercentCallback, ProgressReporter, ProgressThrottle, PROGRESS_STEP,
};
pub use range::{plan_ranges, DownloadRange};
pub use strategy::{
    merge_chunks, DownloadJob, DownloadMode, DownloadStrategy, ParallelStrategy,
    SequentialStrategy, DEFAULT_CHUNK_TIMEOUT,
};
