//! CEF build index: document model and resolution client.

mod client;
mod model;

pub use client::{ArchiveResolver, BuildIndexClient, ResolutionMiss, DEFAULT_CDN_BASE_URL};
pub use model::{
    ArchiveDescriptor, BuildEntry, BuildIdentifier, BuildIndex, OsBuilds, ARCHIVE_EXTENSION,
    MINIMAL_ARTIFACT, STABLE_CHANNEL,
};
