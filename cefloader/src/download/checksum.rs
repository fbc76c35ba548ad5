//! Archive verification against the build index.
//!
//! The CDN index declares a byte size and a SHA-1 digest for every archive.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::error::{LoaderError, LoaderResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the lowercase hexadecimal SHA-1 of a file.
pub fn calculate_file_sha1(path: &Path) -> LoaderResult<String> {
    let mut file = File::open(path).map_err(|e| LoaderError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| LoaderError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify a downloaded archive against its declared size and SHA-1.
///
/// A declared size of zero or an empty digest skips that check. Digest
/// comparison ignores case.
///
/// # Errors
///
/// Returns `SizeMismatch` or `ChecksumMismatch` when the file disagrees with
/// the index, and `ReadFailed` when it cannot be read.
pub fn verify_archive(path: &Path, expected_size: u64, expected_sha1: &str) -> LoaderResult<()> {
    let filename = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    if expected_size > 0 {
        let actual = path
            .metadata()
            .map_err(|e| LoaderError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();
        if actual != expected_size {
            return Err(LoaderError::SizeMismatch {
                filename,
                expected: expected_size,
                actual,
            });
        }
    }

    if !expected_sha1.is_empty() {
        let actual = calculate_file_sha1(path)?;
        if !actual.eq_ignore_ascii_case(expected_sha1) {
            return Err(LoaderError::ChecksumMismatch {
                filename,
                expected: expected_sha1.to_string(),
                actual,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HELLO_WORLD_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    fn write_file(temp: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = temp.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_calculate_file_sha1() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        assert_eq!(calculate_file_sha1(&path).unwrap(), HELLO_WORLD_SHA1);
    }

    #[test]
    fn test_calculate_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "empty.txt", b"");

        assert_eq!(
            calculate_file_sha1(&path).unwrap(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn test_calculate_nonexistent_file() {
        let result = calculate_file_sha1(Path::new("/nonexistent/file.tar.bz2"));
        assert!(matches!(result, Err(LoaderError::ReadFailed { .. })));
    }

    #[test]
    fn test_verify_archive_match() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        assert!(verify_archive(&path, 11, HELLO_WORLD_SHA1).is_ok());
        assert!(verify_archive(&path, 11, &HELLO_WORLD_SHA1.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_archive_size_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        match verify_archive(&path, 12, HELLO_WORLD_SHA1) {
            Err(LoaderError::SizeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 11);
            }
            other => panic!("expected SizeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_archive_checksum_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"hello world");

        match verify_archive(&path, 0, "wrong_checksum") {
            Err(LoaderError::ChecksumMismatch { filename, .. }) => {
                assert_eq!(filename, "test.txt");
            }
            other => panic!("expected ChecksumMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_archive_skips_undeclared_checks() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "test.txt", b"anything");

        assert!(verify_archive(&path, 0, "").is_ok());
    }
}
