//! Artifact and key verification: SHA-256 digests

use sdk::errors::{PackageError, Result};
use sha2::{Digest, Sha256};

/// Verify that the SHA-256 hash of `data` matches `expected_hex`
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<()> {
    let computed = compute_hash(data);

    if !computed.eq_ignore_ascii_case(expected_hex.trim()) {
        return Err(PackageError::HashMismatch {
            expected: expected_hex.to_string(),
            actual: computed,
        });
    }

    Ok(())
}

/// Compute the SHA-256 hash of `data` and return hex string
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Short fingerprint of a trust key for operator output
pub fn key_fingerprint(key: &[u8]) -> String {
    let hash = compute_hash(key);
    hash[..16]
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
