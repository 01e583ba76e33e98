use sha1::{Digest, Sha1};

/// Compute the SHA-1 hash of a byte slice, returning a lowercase hex string.
///
/// npm registries publish this digest as `dist.shasum`.
pub fn sha1_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Check `data` against an expected SHA-1 hex digest (case-insensitive).
pub fn verify_sha1(data: &[u8], expected: &str) -> bool {
    sha1_bytes(data).eq_ignore_ascii_case(expected.trim())
}
