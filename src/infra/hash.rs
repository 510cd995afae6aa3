//! Content hashing for cache keys.
//!
//! A stable xxh64 digest of the source bytes is the content-hash component
//! of every persistent cache key, so identical bytes share cache entries
//! across paths and runs.

use xxhash_rust::xxh64::Xxh64;

/// Stable 64-bit digest of a byte buffer (seed 0).
pub fn content_hash(bytes: &[u8]) -> u64 {
    let mut hasher = Xxh64::new(0);
    hasher.update(bytes);
    hasher.digest()
}

/// Digest rendered as fixed-width lowercase hex, for composing cache keys.
pub fn content_hash_hex(bytes: &[u8]) -> String {
    format!("{:016x}", content_hash(bytes))
}
