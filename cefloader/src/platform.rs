//! Target platform model and CDN platform identifiers.
//!
//! The CEF build index is keyed by a lowercase identifier made of the
//! operating-system name followed by an architecture token, for example
//! `linuxarm`, `windows64` or `macosx64`.

use std::fmt;
use std::str::FromStr;

use crate::error::{LoaderError, LoaderResult};

/// Operating-system family of the target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Linux,
    MacOsx,
}

impl Platform {
    /// All supported platforms.
    pub const ALL: [Platform; 3] = [Platform::Windows, Platform::Linux, Platform::MacOsx];

    /// Detect the platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOsx
        } else {
            Platform::Linux
        }
    }

    /// Canonical lowercase name used in platform identifiers.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOsx => "macosx",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macosx" | "macos" | "osx" => Ok(Platform::MacOsx),
            other => Err(LoaderError::InvalidConfig(format!(
                "unknown platform '{}'",
                other
            ))),
        }
    }
}

/// Processor architecture of the target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86,
    X64,
    Arm,
    Arm64,
}

impl Architecture {
    /// All supported architectures.
    pub const ALL: [Architecture; 4] = [
        Architecture::X86,
        Architecture::X64,
        Architecture::Arm,
        Architecture::Arm64,
    ];

    /// Detect the architecture this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_arch = "x86") {
            Architecture::X86
        } else if cfg!(target_arch = "aarch64") {
            Architecture::Arm64
        } else if cfg!(target_arch = "arm") {
            Architecture::Arm
        } else {
            Architecture::X64
        }
    }

    /// Token appended to the platform name: `X64` becomes `64`, `X86` becomes `32`.
    pub fn token(&self) -> &'static str {
        match self {
            Architecture::X86 => "32",
            Architecture::X64 => "64",
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Architecture {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "32" | "i686" => Ok(Architecture::X86),
            "x64" | "64" | "x86_64" | "amd64" => Ok(Architecture::X64),
            "arm" => Ok(Architecture::Arm),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            other => Err(LoaderError::InvalidConfig(format!(
                "unknown architecture '{}'",
                other
            ))),
        }
    }
}

/// Canonical build-index key for a platform/architecture pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformIdentifier {
    platform: Platform,
    architecture: Architecture,
    key: String,
}

impl PlatformIdentifier {
    /// Build the identifier for a supported platform/architecture pair.
    ///
    /// Combinations the CDN does not publish builds for (32-bit or 32-bit ARM
    /// macOS, 32-bit ARM Windows) fail with `UnsupportedPlatform`.
    pub fn new(platform: Platform, architecture: Architecture) -> LoaderResult<Self> {
        use Architecture::*;
        use Platform::*;

        let key = match (platform, architecture) {
            (Windows, X86 | X64 | Arm64) | (Linux, _) | (MacOsx, X64) => {
                format!("{}{}", platform.name(), architecture.token())
            }
            // The CDN drops the trailing "x" for Apple Silicon builds.
            (MacOsx, Arm64) => "macosarm64".to_string(),
            (Windows, Arm) | (MacOsx, X86 | Arm) => {
                return Err(LoaderError::UnsupportedPlatform {
                    platform: platform.to_string(),
                    architecture: architecture.to_string(),
                })
            }
        };

        Ok(Self {
            platform,
            architecture,
            key,
        })
    }

    /// Identifier for the host this binary was compiled for.
    pub fn current() -> LoaderResult<Self> {
        Self::new(Platform::current(), Architecture::current())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// The lowercase index key, e.g. `linuxarm`.
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for PlatformIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for PlatformIdentifier {
    type Err = LoaderError;

    /// Parse an index key back into its components.
    ///
    /// Accepts any casing; the rendered identifier is always canonical.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        for platform in Platform::ALL {
            for architecture in Architecture::ALL {
                if let Ok(id) = PlatformIdentifier::new(platform, architecture) {
                    if id.key == lower {
                        return Ok(id);
                    }
                }
            }
        }
        Err(LoaderError::InvalidConfig(format!(
            "unknown platform identifier '{}'",
            s
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_concatenates_os_and_arch() {
        let id = PlatformIdentifier::new(Platform::Linux, Architecture::Arm).unwrap();
        assert_eq!(id.as_str(), "linuxarm");

        let id = PlatformIdentifier::new(Platform::Windows, Architecture::X64).unwrap();
        assert_eq!(id.as_str(), "windows64");

        let id = PlatformIdentifier::new(Platform::Windows, Architecture::X86).unwrap();
        assert_eq!(id.as_str(), "windows32");

        let id = PlatformIdentifier::new(Platform::MacOsx, Architecture::X64).unwrap();
        assert_eq!(id.as_str(), "macosx64");
    }

    #[test]
    fn test_apple_silicon_key() {
        let id = PlatformIdentifier::new(Platform::MacOsx, Architecture::Arm64).unwrap();
        assert_eq!(id.as_str(), "macosarm64");
    }

    #[test]
    fn test_unsupported_combinations_fail() {
        for (platform, arch) in [
            (Platform::MacOsx, Architecture::X86),
            (Platform::MacOsx, Architecture::Arm),
            (Platform::Windows, Architecture::Arm),
        ] {
            let result = PlatformIdentifier::new(platform, arch);
            assert!(
                matches!(result, Err(LoaderError::UnsupportedPlatform { .. })),
                "{:?}/{:?} should be unsupported",
                platform,
                arch
            );
        }
    }

    #[test]
    fn test_normalization_is_total_and_idempotent() {
        for platform in Platform::ALL {
            for arch in Architecture::ALL {
                let first = PlatformIdentifier::new(platform, arch);
                let second = PlatformIdentifier::new(platform, arch);
                match (first, second) {
                    (Ok(a), Ok(b)) => {
                        assert_eq!(a, b);
                        let reparsed: PlatformIdentifier = a.as_str().parse().unwrap();
                        assert_eq!(reparsed.as_str(), a.as_str());
                        assert_eq!(reparsed.platform(), platform);
                        assert_eq!(reparsed.architecture(), arch);
                    }
                    (Err(_), Err(_)) => {}
                    _ => panic!("normalization is not deterministic"),
                }
            }
        }
    }

    #[test]
    fn test_parse_accepts_any_case() {
        let id: PlatformIdentifier = "LinuxARM64".parse().unwrap();
        assert_eq!(id.as_str(), "linuxarm64");
    }

    #[test]
    fn test_parse_unknown_identifier() {
        assert!("solaris64".parse::<PlatformIdentifier>().is_err());
    }

    #[test]
    fn test_architecture_aliases() {
        assert_eq!("x86_64".parse::<Architecture>().unwrap(), Architecture::X64);
        assert_eq!("aarch64".parse::<Architecture>().unwrap(), Architecture::Arm64);
        assert_eq!("X86".parse::<Architecture>().unwrap(), Architecture::X86);
    }

    #[test]
    fn test_current_host_is_supported() {
        assert!(PlatformIdentifier::current().is_ok());
    }
}
