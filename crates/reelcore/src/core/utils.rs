//! Small formatting helpers shared by the pipeline and the chat layer.

/// Human-readable size with one decimal, 1024-based: `1536` → `"1.5KB"`.
///
/// # Example
///
/// ```
/// use reelcore::core::utils::human_size;
///
/// assert_eq!(human_size(512), "512.0B");
/// assert_eq!(human_size(1_950_000_000), "1.8GB");
/// ```
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{:.1}{}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}PB", value)
}

/// Keeps at most the last `max_bytes` of `text`, cut on a char boundary.
///
/// Tool stderr can be megabytes; logs and error details only need the tail.
pub fn truncate_tail_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size_units() {
        assert_eq!(human_size(0), "0.0B");
        assert_eq!(human_size(1023), "1023.0B");
        assert_eq!(human_size(1024), "1.0KB");
        assert_eq!(human_size(10 * 1024 * 1024), "10.0MB");
        assert_eq!(human_size(2_100_000_000), "2.0GB");
        assert!(human_size(u64::MAX).ends_with("PB"));
    }

    #[test]
    fn test_truncate_tail_utf8() {
        assert_eq!(truncate_tail_utf8("hello", 10), "hello");
        assert_eq!(truncate_tail_utf8("hello world", 5), "world");
        // "é" is two bytes; never split it
        assert_eq!(truncate_tail_utf8("aé", 1), "");
        assert_eq!(truncate_tail_utf8("aéb", 3), "éb");
    }
}
