/// Compute the BLAKE3 hash of a byte slice, returning the hex-encoded digest.
#[must_use]
pub fn blake3_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Short content hash (first `len` hex chars of the BLAKE3 digest).
///
/// `len` is clamped to the digest length.
#[must_use]
pub fn short_hash(data: &[u8], len: usize) -> String {
    let full = blake3_bytes(data);
    full[..len.min(full.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_bytes() {
        let hash = blake3_bytes(b"hello world");
        assert_eq!(
            hash,
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash(b"hello world", 8), "d74981ef");
        assert_eq!(short_hash(b"hello world", 1000).len(), 64);
    }
}
