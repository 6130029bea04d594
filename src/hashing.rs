//! Centralized module for cryptographic hashing algorithms.
//!
//! Certificate identity fingerprints use a fixed digest order
//! (MD5, SHA-1, SHA-256) computed over raw, undecoded bytes.

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Computes the MD5 digest of the given data.
pub fn md5_digest(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

/// Computes the SHA-1 digest of the given data.
pub fn sha1_digest(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

/// Computes the SHA-256 digest of the given data.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Renders a digest as grouped uppercase hex: pairs joined by `:`,
/// eight pairs per group, groups joined by two spaces.
///
/// `D4:1D:8C:D9:8F:00:B2:04  E9:80:09:98:EC:F8:42:7E`
pub fn format_fingerprint(digest: &[u8]) -> String {
    let hex = hex::encode_upper(digest);
    let pairs: Vec<&str> = hex
        .as_bytes()
        .chunks(2)
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect();
    pairs
        .chunks(8)
        .map(|group| group.join(":"))
        .collect::<Vec<_>>()
        .join("  ")
}
