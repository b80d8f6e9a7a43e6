//! Digest validation and content path derivation (spec §3, §4.2)

use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// `true` iff `s` matches `^[0-9a-f]{64}$`.
pub fn is_valid_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

pub fn validate_digest(s: &str) -> Result<(), StoreError> {
    if is_valid_digest(s) {
        Ok(())
    } else {
        Err(StoreError::InvalidDigest(s.to_string()))
    }
}

/// `<root>/blobs/<h0h1>/<h>`, per spec §4.2. Caller must have already
/// validated `digest` with [`validate_digest`].
pub fn content_path(root: &Path, digest: &str) -> PathBuf {
    let shard = &digest[..2];
    root.join("blobs").join(shard).join(digest)
}

/// Compute the lowercase hex SHA-256 digest of `data`.
pub fn compute_sha256(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_digest_accepts_lowercase_hex() {
        assert!(is_valid_digest(&"a".repeat(64)));
        assert!(is_valid_digest(&"0123456789abcdef".repeat(4)));
    }

    #[test]
    fn valid_digest_rejects_wrong_length_or_case() {
        assert!(!is_valid_digest(&"a".repeat(63)));
        assert!(!is_valid_digest(&"A".repeat(64)));
        assert!(!is_valid_digest(&"g".repeat(64)));
    }

    #[test]
    fn content_path_shards_on_first_two_chars() {
        let digest = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        let path = content_path(Path::new("/data"), digest);
        assert_eq!(path, Path::new("/data/blobs/2c/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"));
    }

    #[test]
    fn compute_sha256_matches_known_vector() {
        assert_eq!(
            compute_sha256(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
