//! Utility functions and helpers

/// Percent-encode a name into a file stem
///
/// The mapping is reversible, so distinct names never share a file.
pub fn encode_filename(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

/// Recover the name a stem was produced from with [`encode_filename`]
pub fn decode_filename(stem: &str) -> Option<String> {
    urlencoding::decode(stem).ok().map(|name| name.into_owned())
}

/// Truncate a string to a maximum byte length, ensuring valid UTF-8 boundaries
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len.saturating_sub(3);
        while !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_filename() {
        assert_eq!(encode_filename("web:1234"), "web%3A1234");
        assert_eq!(encode_filename("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_eq!(encode_filename("3f2a-b9c1"), "3f2a-b9c1");
    }

    #[test]
    fn test_encode_filename_keeps_keys_apart() {
        assert_ne!(encode_filename("team:1"), encode_filename("team_1"));
        assert_ne!(encode_filename("a b"), encode_filename("a_b"));
        for name in ["team:1", "team_1", "a/b", "100%", "héllo"] {
            assert_eq!(decode_filename(&encode_filename(name)).as_deref(), Some(name));
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("héllo wörld", 5), "h...");
    }
}
