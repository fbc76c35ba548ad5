//! cefloader - Chromium Embedded Framework runtime loader
//!
//! Fetches the CEF runtime for the current platform from the CEF build CDN
//! and installs it next to the host application:
//!
//! 1. Resolve the stable `minimal` archive in the CDN's `index.json`
//! 2. Download it with parallel ranged requests (sequential fallback)
//! 3. Verify its size and SHA-1
//! 4. Decompress the `.tar.bz2` and unpack it
//! 5. Copy the runtime into the application directory
//!
//! # Example
//!
//! ```no_run
//! use cefloader::{BuildIdentifier, LoaderConfig, RuntimeInstaller};
//!
//! let config = LoaderConfig::new(BuildIdentifier::new(
//!     "87.1.14+ga29e9a3+chromium-87.0.4280.141",
//!     "87.0.4280.141",
//! ))
//! .with_app_dir("/opt/myapp");
//!
//! let report = RuntimeInstaller::from_config(config)?.install()?;
//! println!("installed {} files", report.files_installed);
//! # Ok::<(), cefloader::LoaderError>(())
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod extractor;
pub mod http;
pub mod index;
pub mod installer;
pub mod pipeline;
pub mod platform;

pub use config::{ConfigFile, LoaderConfig};
pub use error::{LoaderError, LoaderResult};
pub use index::{ArchiveDescriptor, ArchiveResolver, BuildIdentifier, BuildIndexClient};
pub use pipeline::{InstallReport, InstallStage, RuntimeInstaller};
pub use platform::{Architecture, Platform, PlatformIdentifier};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
