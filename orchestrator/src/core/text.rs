//! Bounded text helpers for log-safe failure details.

/// Return at most `max_chars` characters of `text`, trimmed of surrounding whitespace.
///
/// Truncates on a character boundary so multi-byte output never splits.
pub fn bounded_prefix(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((end, _)) => trimmed[..end].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(bounded_prefix("  boom  ", 10), "boom");
    }

    #[test]
    fn long_text_is_cut_at_limit() {
        assert_eq!(bounded_prefix("abcdefgh", 3), "abc");
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundary() {
        assert_eq!(bounded_prefix("ééééé", 2), "éé");
    }

    #[test]
    fn zero_limit_yields_empty() {
        assert_eq!(bounded_prefix("abc", 0), "");
    }
}
