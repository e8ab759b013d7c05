use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::model::{ChecksumAlgorithm, Checksums};

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Hashes the full content of `path` with every supported algorithm in a
/// single read pass.
pub fn hash_file(path: &Path) -> Result<Checksums> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut md5 = Md5::new();
    let mut sha1 = Sha1::new();
    let mut blake3 = blake3::Hasher::new();
    let mut buffer = vec![0_u8; READ_BUFFER_BYTES];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        let chunk = &buffer[..bytes_read];
        md5.update(chunk);
        sha1.update(chunk);
        blake3.update(chunk);
    }

    Ok(Checksums {
        md5: hex::encode(md5.finalize()),
        sha1: hex::encode(sha1.finalize()),
        blake3: blake3.finalize().to_hex().to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verification {
    pub matched: bool,
    pub algorithm: Option<ChecksumAlgorithm>,
    pub message: String,
    pub checksums: Checksums,
}

/// Checks `path` against a known-good checksum.
///
/// The expected value may be any supported digest; mixed checksum
/// databases list MD5 for some sets and SHA-1 for others. A mismatch is a
/// normal result, only an unreadable file is an error.
pub fn verify(path: &Path, expected: &str) -> Result<Verification> {
    let checksums = hash_file(path)?;
    let expected = expected.trim().to_lowercase();

    let algorithm = ChecksumAlgorithm::ALL
        .into_iter()
        .find(|algorithm| checksums.get(*algorithm) == expected);

    let message = match algorithm {
        Some(algorithm) => format!("checksum matches ({})", algorithm.label()),
        None => format!(
            "checksum mismatch for {}: got MD5 {}, SHA-1 {}, BLAKE3 {}",
            path.display(),
            checksums.md5,
            checksums.sha1,
            checksums.blake3
        ),
    };

    Ok(Verification {
        matched: algorithm.is_some(),
        algorithm,
        message,
        checksums,
    })
}
