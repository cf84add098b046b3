//! SHA-256 helpers shared by config hashing, identity repair, sanitizer
//! fallbacks and collision suffixes.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `input`.
pub fn sha256_hex(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// First 8 hex characters of the SHA-256 of `input`.
pub fn short_hash(input: &str) -> String {
    let mut full = sha256_hex(input.as_bytes());
    full.truncate(8);
    full
}
