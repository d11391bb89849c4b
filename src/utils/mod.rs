//! Utility functions and helpers.

pub mod http;

use std::sync::{Mutex, MutexGuard, PoisonError};

use unicode_segmentation::UnicodeSegmentation;

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Normalize a series title into a canonical alias key.
///
/// Lowercases and joins unicode words with single spaces, so that
/// "One-Punch  Man" and "one punch man" (and CJK titles, which have no
/// ASCII word boundaries) normalize to the same key.
pub fn normalize_title(title: &str) -> String {
    title
        .unicode_words()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("One-Punch  Man"), "one punch man");
        assert_eq!(normalize_title("  ONE PUNCH man "), "one punch man");
        assert_eq!(normalize_title("ワンパンマン"), "ワンパンマン");
    }

    #[test]
    fn test_normalize_title_strips_punctuation_words() {
        assert_eq!(normalize_title("Dr. Stone!"), "dr stone");
    }
}
