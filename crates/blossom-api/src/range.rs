//! Single-range `Range: bytes=a-b` parsing (RFC 7233, spec §4.5)

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// Returns `None` if there's no `Range` header or it isn't a single
/// `bytes=` range (multiple ranges are treated as "no range" per spec).
/// Returns `Some(Err(()))` if a single range was requested but is
/// unsatisfiable against `total_len`.
pub fn parse_range(header: Option<&str>, total_len: u64) -> Option<Result<ByteRange, ()>> {
    let header = header?;
    let spec = header.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None; // multiple ranges: treat as full response
    }

    let (start_s, end_s) = spec.split_once('-')?;

    let range = if start_s.is_empty() {
        // suffix range: bytes=-N means the last N bytes
        let suffix_len: u64 = end_s.parse().ok()?;
        if suffix_len == 0 || total_len == 0 {
            return Some(Err(()));
        }
        let start = total_len.saturating_sub(suffix_len);
        ByteRange {
            start,
            end: total_len - 1,
        }
    } else {
        let start: u64 = start_s.parse().ok()?;
        let end: u64 = if end_s.is_empty() {
            total_len.saturating_sub(1)
        } else {
            // RFC 7233 §2.1: an end past the resource's last byte position
            // is clamped to it, not rejected.
            end_s.parse::<u64>().ok()?.min(total_len.saturating_sub(1))
        };
        ByteRange { start, end }
    };

    if total_len == 0 || range.start > range.end || range.start >= total_len {
        return Some(Err(()));
    }

    Some(Ok(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_range() {
        assert_eq!(parse_range(Some("bytes=1-3"), 5), Some(Ok(ByteRange { start: 1, end: 3 })));
    }

    #[test]
    fn open_ended_range_goes_to_end() {
        assert_eq!(parse_range(Some("bytes=2-"), 5), Some(Ok(ByteRange { start: 2, end: 4 })));
    }

    #[test]
    fn unsatisfiable_range_reported() {
        assert_eq!(parse_range(Some("bytes=10-20"), 5), Some(Err(())));
    }

    #[test]
    fn multi_range_treated_as_no_range() {
        assert_eq!(parse_range(Some("bytes=0-1,3-4"), 5), None);
    }

    #[test]
    fn no_header_is_no_range() {
        assert_eq!(parse_range(None, 5), None);
    }

    #[test]
    fn suffix_range_takes_last_n_bytes() {
        assert_eq!(parse_range(Some("bytes=-2"), 5), Some(Ok(ByteRange { start: 3, end: 4 })));
    }

    #[test]
    fn end_beyond_resource_length_is_clamped_not_rejected() {
        assert_eq!(parse_range(Some("bytes=0-999999"), 5), Some(Ok(ByteRange { start: 0, end: 4 })));
    }
}
