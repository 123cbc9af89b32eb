// hasher.rs — SHA-256 helpers for the audit hash chain.
//
// Each stored line is hashed as raw bytes; the digest of line N becomes the
// `previous_hash` of line N+1. Digests are 64-character lowercase hex.

use sha2::{Digest, Sha256};

pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}
