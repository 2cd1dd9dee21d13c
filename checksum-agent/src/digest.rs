//! Content digests.
//!
//! One [`ChecksumEngine`] is built per run from configuration and shared by
//! every job. Digests are lowercase hex.

use crate::utils::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use sha2::digest::DynDigest;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Read buffer for streaming file content through a hasher.
const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of a hex digest produced by this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 => 96,
            HashAlgorithm::Sha512 => 128,
        }
    }

    /// MD5 and SHA-1 have practical collision attacks. They stay selectable
    /// only to compare against snapshots written with them.
    pub fn is_legacy(&self) -> bool {
        matches!(self, HashAlgorithm::Md5 | HashAlgorithm::Sha1)
    }

    fn hasher(&self) -> Box<dyn DynDigest + Send> {
        match self {
            HashAlgorithm::Md5 => Box::new(md5::Md5::default()),
            HashAlgorithm::Sha1 => Box::new(sha1::Sha1::default()),
            HashAlgorithm::Sha256 => Box::new(sha2::Sha256::default()),
            HashAlgorithm::Sha384 => Box::new(sha2::Sha384::default()),
            HashAlgorithm::Sha512 => Box::new(sha2::Sha512::default()),
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha384" | "sha-384" => Ok(HashAlgorithm::Sha384),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            _ => Err(MonitorError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<HashAlgorithm> for String {
    fn from(value: HashAlgorithm) -> Self {
        value.name().to_string()
    }
}

/// Computes hex digests with one fixed algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumEngine {
    algorithm: HashAlgorithm,
}

impl ChecksumEngine {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digest a byte slice.
    pub fn digest(&self, bytes: &[u8]) -> String {
        let mut hasher = self.algorithm.hasher();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Digest everything `reader` yields. Same output as [`digest`] over the
    /// same bytes, without holding them in memory.
    ///
    /// [`digest`]: ChecksumEngine::digest
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> std::io::Result<String> {
        let mut hasher = self.algorithm.hasher();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [HashAlgorithm; 5] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    #[test]
    fn test_known_vectors() {
        let sha256 = ChecksumEngine::new(HashAlgorithm::Sha256);
        assert_eq!(
            sha256.digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256.digest(b"1"),
            "6b86b273ff34fce19d6b804eff5a3f5747ada4eaa22f1d49c01e52ddb7875b4b"
        );

        let md5 = ChecksumEngine::new(HashAlgorithm::Md5);
        assert_eq!(md5.digest(b"1"), "c4ca4238a0b923820dcc509a6f75849b");

        let sha1 = ChecksumEngine::new(HashAlgorithm::Sha1);
        assert_eq!(sha1.digest(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_digest_is_deterministic_and_sized() {
        for algorithm in ALL {
            let engine = ChecksumEngine::new(algorithm);
            let first = engine.digest(b"same bytes");
            assert_eq!(first, engine.digest(b"same bytes"));
            assert_ne!(first, engine.digest(b"other bytes"));
            assert_eq!(first.len(), algorithm.hex_len(), "{}", algorithm);
        }
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        // Larger than the read buffer so several reads are needed
        let data: Vec<u8> = (0..READ_BUFFER_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();

        for algorithm in ALL {
            let engine = ChecksumEngine::new(algorithm);
            let streamed = engine.digest_reader(std::io::Cursor::new(&data)).unwrap();
            assert_eq!(streamed, engine.digest(&data));
        }
    }

    #[test]
    fn test_parse_algorithm_names() {
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("md5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert_eq!(" sha512 ".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert!(matches!(
            "crc32".parse::<HashAlgorithm>(),
            Err(MonitorError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_legacy_flags() {
        assert!(HashAlgorithm::Md5.is_legacy());
        assert!(HashAlgorithm::Sha1.is_legacy());
        assert!(!HashAlgorithm::Sha256.is_legacy());
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha256);
    }
}
