//! crates/journal_core/src/words.rs
//!
//! Word counting used as the input to every reward calculation.

/// Counts runs of non-whitespace, where whitespace is only ASCII space, tab,
/// carriage return and line feed.
pub fn count_words(text: &str) -> usize {
    text.split(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'))
        .filter(|run| !run.is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \t\r\n  "), 0);
    }

    #[test]
    fn test_mixed_separators() {
        assert_eq!(count_words("hari ini\tlumayan\r\ncapek"), 4);
        assert_eq!(count_words("  leading and trailing  "), 3);
    }

    #[test]
    fn test_only_ascii_whitespace_splits() {
        // A no-break space is not a separator.
        assert_eq!(count_words("satu\u{00A0}dua"), 1);
        assert_eq!(count_words("punctuation,stays-attached!"), 1);
    }
}
