//! Streaming file checksums.
//!
//! Files are hashed in a single pass with a read buffer sized by file
//! length, so large archives are never held in memory.

use crate::progress::ByteProgress;
use bakctl_core::{Error, Result};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Algorithm used for record checksums.
pub const DEFAULT_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha1;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Lowercase label, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of the hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha512 => 128,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(Error::invalid_config(format!(
                "Unsupported hash algorithm '{}': expected md5, sha1, sha256 or sha512",
                other
            ))),
        }
    }
}

/// Read buffer size for a file of `len` bytes.
pub fn buffer_size_for(len: u64) -> usize {
    let size = match len {
        l if l < 32 * KIB => 32 * KIB,
        l if l < 128 * KIB => 64 * KIB,
        l if l < 512 * KIB => 128 * KIB,
        l if l < MIB => 256 * KIB,
        l if l < 4 * MIB => 512 * KIB,
        l if l < 16 * MIB => MIB,
        l if l < 64 * MIB => 2 * MIB,
        _ => 4 * MIB,
    };
    size as usize
}

/// Computes the hex digest of the file at `path`.
pub fn checksum(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    digest_file(path, algorithm, false)
}

/// Like [`checksum`], drawing a byte progress bar on the terminal.
pub fn checksum_with_progress(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    digest_file(path, algorithm, true)
}

fn digest_file(path: &Path, algorithm: HashAlgorithm, show_progress: bool) -> Result<String> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    let progress = show_progress.then(|| {
        ByteProgress::new(len, &format!("Verifying {}", algorithm))
    });

    debug!(
        path = %path.display(),
        algorithm = %algorithm,
        buffer = buffer_size_for(len),
        "Computing checksum"
    );

    let result = match algorithm {
        HashAlgorithm::Md5 => stream::<Md5>(file, len, progress.as_ref()),
        HashAlgorithm::Sha1 => stream::<Sha1>(file, len, progress.as_ref()),
        HashAlgorithm::Sha256 => stream::<Sha256>(file, len, progress.as_ref()),
        HashAlgorithm::Sha512 => stream::<Sha512>(file, len, progress.as_ref()),
    };

    if let Some(progress) = &progress {
        progress.finish();
    }
    result
}

fn stream<D: Digest>(mut file: File, len: u64, progress: Option<&ByteProgress>) -> Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; buffer_size_for(len)];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
        if let Some(progress) = progress {
            progress.inc(n as u64);
        }
    }

    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join("data.bin");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_known_digests() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), b"abc");

        assert_eq!(
            checksum(&path, HashAlgorithm::Md5).unwrap(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            checksum(&path, HashAlgorithm::Sha1).unwrap(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            checksum(&path, HashAlgorithm::Sha256).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            checksum(&path, HashAlgorithm::Sha512).unwrap().len(),
            HashAlgorithm::Sha512.hex_len()
        );
    }

    #[test]
    fn test_multi_buffer_file_matches_progress_variant() {
        let tmp = TempDir::new().unwrap();
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let path = write_file(tmp.path(), &content);

        let plain = checksum(&path, HashAlgorithm::Sha256).unwrap();
        let with_progress = checksum_with_progress(&path, HashAlgorithm::Sha256).unwrap();
        assert_eq!(plain, with_progress);

        let mut hasher = Sha256::new();
        hasher.update(&content);
        assert_eq!(plain, to_hex(&hasher.finalize()));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = checksum(&tmp.path().join("nope"), HashAlgorithm::Sha1).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_buffer_bands() {
        assert_eq!(buffer_size_for(0), 32 * 1024);
        assert_eq!(buffer_size_for(32 * 1024), 64 * 1024);
        assert_eq!(buffer_size_for(700 * 1024), 256 * 1024);
        assert_eq!(buffer_size_for(10 * 1024 * 1024), 1024 * 1024);
        assert_eq!(buffer_size_for(63 * 1024 * 1024), 2 * 1024 * 1024);
        assert_eq!(buffer_size_for(64 * 1024 * 1024), 4 * 1024 * 1024);
    }

    #[test]
    fn test_algorithm_labels() {
        assert_eq!("SHA1".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        assert_eq!(HashAlgorithm::Md5.to_string(), "md5");
        assert!("crc32".parse::<HashAlgorithm>().is_err());
        assert_eq!(DEFAULT_ALGORITHM, HashAlgorithm::Sha1);
    }
}
