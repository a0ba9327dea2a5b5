//! SHA-256 content hashing for ontology sources.
//!
//! The ancestor-closure cache is keyed by the digest of the raw ontology
//! bytes, so the same file content always maps to the same cache entry no
//! matter where it lives on disk.

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::{OntoraError, Result};

const CHUNK: usize = 64 * 1024;

/// Hex-encoded SHA-256 of in-memory data.
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex-encoded SHA-256 of everything readable from `reader`, in 64 KB chunks.
pub fn sha256_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex-encoded SHA-256 of a file's contents.
///
/// The I/O error carries the offending path.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        OntoraError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    sha256_reader(std::io::BufReader::new(file))
}
