//! Manual query-string parsing that preserves duplicate keys (spec §9)
//!
//! `serde`-based query extractors collapse repeated keys into the last
//! value; Blossom's `xs=` proxy hints rely on every repetition surviving.

/// All values of `key`, URL-unescaped, in the order they appear.
pub fn all_values(raw_query: Option<&str>, key: &str) -> Vec<String> {
    let Some(raw_query) = raw_query else {
        return Vec::new();
    };

    raw_query
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            if k == key {
                Some(urlencoding_decode(v))
            } else {
                None
            }
        })
        .collect()
}

/// Last value of `key`, or `None` if absent.
pub fn single_value(raw_query: Option<&str>, key: &str) -> Option<String> {
    all_values(raw_query, key).pop()
}

fn urlencoding_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_all_duplicate_values() {
        let values = all_values(Some("xs=https%3A%2F%2Fa.example&xs=https%3A%2F%2Fb.example"), "xs");
        assert_eq!(values, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn missing_key_returns_empty() {
        assert!(all_values(Some("cursor=abc"), "xs").is_empty());
        assert!(all_values(None, "xs").is_empty());
    }

    #[test]
    fn single_value_picks_last() {
        assert_eq!(single_value(Some("limit=10&limit=20"), "limit"), Some("20".to_string()));
    }
}
