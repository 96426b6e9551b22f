//! Small string helpers shared by the key generator and the CLI.

/// Return the first `max_chars` characters of `s`.
///
/// Counts Unicode scalar values, so the cut never lands inside a code point.
#[inline]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shorten `s` for single-line display, appending `...` when cut.
pub fn preview(s: &str, max_chars: usize) -> String {
    let flat = s.replace('\n', " ");
    let cut = truncate_chars(&flat, max_chars);
    if cut.len() < flat.len() {
        format!("{}...", cut)
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_ascii() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 5), "hello");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("", 4), "");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        // '─' is 3 bytes but one char
        let s = "a─b─c";
        assert_eq!(truncate_chars(s, 2), "a─");
        assert_eq!(truncate_chars(s, 4), "a─b─");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("line one\nline two", 8), "line one...");
    }
}
