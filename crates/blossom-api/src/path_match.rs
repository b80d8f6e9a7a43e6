//! Blob route path parsing (spec §4.5 "Path parsing for blob routes")

use blossom_store::path::is_valid_digest;

/// `"<64 hex>[.ext]"` -> the digest, with any extension stripped and ignored.
/// Anything else (wrong length, non-hex, junk after the dot's position) is
/// `None`, meaning the route does not match and the caller should fall
/// through to 404.
pub fn parse_blob_segment(segment: &str) -> Option<&str> {
    if segment.len() < 64 {
        return None;
    }
    let (digest, rest) = segment.split_at(64);
    if !is_valid_digest(digest) {
        return None;
    }
    if rest.is_empty() || rest.starts_with('.') {
        Some(digest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_digest() {
        let h = "a".repeat(64);
        assert_eq!(parse_blob_segment(&h), Some(h.as_str()));
    }

    #[test]
    fn accepts_digest_with_extension() {
        let h = "a".repeat(64);
        let segment = format!("{h}.png");
        assert_eq!(parse_blob_segment(&segment), Some(h.as_str()));
    }

    #[test]
    fn rejects_wrong_length_or_missing_dot_separator() {
        assert_eq!(parse_blob_segment(&"a".repeat(63)), None);
        let h = "a".repeat(64);
        let segment = format!("{h}x");
        assert_eq!(parse_blob_segment(&segment), None);
    }

    #[test]
    fn rejects_non_hex() {
        let segment = "g".repeat(64);
        assert_eq!(parse_blob_segment(&segment), None);
    }
}
