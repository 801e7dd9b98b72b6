//! # Text Layer
//!
//! Offsets, ranges and the zero-copy string types every other module is
//! built on.
//!
//! ## Overview
//!
//! - [`TextSize`] / [`TextRange`]: byte offsets into UTF-8 source (re-exported
//!   from the `text-size` crate)
//! - [`StringToken`]: a cheaply clonable string that is either a view into a
//!   shared buffer, a `'static` literal, or an owned copy
//! - [`LowerCase`]: a lazily lowercasing projection over any [`TextLike`]
//! - [`TextLike`]: the capability the matcher and the formatter need from a
//!   piece of text
//!
//! ## Usage
//!
//! ```rust
//! use parselet::text::{StringToken, TextLike};
//! use std::sync::Arc;
//!
//! let source: Arc<str> = Arc::from("let x = 1;");
//! let all = StringToken::shared(source.clone(), 0, source.len());
//! let name = all.substring(4, 5);
//! assert_eq!(name, "x");
//! assert!(name.is_view_of(&source));
//! assert_eq!(all.char_at(4), Some('x'));
//! ```

mod lower;
mod token;

pub use lower::LowerCase;
pub use text_size::{TextLen, TextRange, TextSize};
pub use token::StringToken;

/// Common read access over the string representations used in the engine.
///
/// Offsets are byte offsets. `char_at` returns `None` when the offset is out
/// of bounds or does not fall on a character boundary.
pub trait TextLike {
    /// Length in bytes
    fn text_len(&self) -> usize;

    /// Character starting at `offset`
    fn char_at(&self, offset: usize) -> Option<char>;

    /// Iterate the characters in order
    fn text_chars(&self) -> impl Iterator<Item = char> + '_;

    /// Whether the content is empty
    fn is_text_empty(&self) -> bool {
        self.text_len() == 0
    }

    /// Content equality against any other text, independent of representation
    fn content_eq<T: TextLike + ?Sized>(&self, other: &T) -> bool {
        self.text_chars().eq(other.text_chars())
    }

    /// Whether the content starts with `prefix`
    fn starts_with_text<T: TextLike + ?Sized>(&self, prefix: &T) -> bool {
        let mut mine = self.text_chars();
        prefix.text_chars().all(|c| mine.next() == Some(c))
    }
}

impl TextLike for str {
    fn text_len(&self) -> usize {
        self.len()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.get(offset..)?.chars().next()
    }

    fn text_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.chars()
    }
}

impl TextLike for String {
    fn text_len(&self) -> usize {
        self.len()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.as_str().char_at(offset)
    }

    fn text_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.chars()
    }
}

impl<T: TextLike + ?Sized> TextLike for &T {
    fn text_len(&self) -> usize {
        (**self).text_len()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        (**self).char_at(offset)
    }

    fn text_chars(&self) -> impl Iterator<Item = char> + '_ {
        (**self).text_chars()
    }
}

/// Convert a byte offset into a [`TextSize`], saturating at `u32::MAX`.
#[must_use]
pub fn size_of(offset: usize) -> TextSize {
    TextSize::from(u32::try_from(offset).unwrap_or(u32::MAX))
}

/// Build a range from byte offsets.
#[must_use]
pub fn range_of(start: usize, end: usize) -> TextRange {
    TextRange::new(size_of(start), size_of(end.max(start)))
}

/// Number of leading bytes two strings share, rounded down to a char boundary.
#[must_use]
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    let mut len = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while !a.is_char_boundary(len) {
        len -= 1;
    }
    len
}

/// Number of trailing bytes two strings share, rounded down to a char boundary.
#[must_use]
pub fn common_suffix_len(a: &str, b: &str) -> usize {
    let mut len = a
        .as_bytes()
        .iter()
        .rev()
        .zip(b.as_bytes().iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    while !a.is_char_boundary(a.len() - len) {
        len -= 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_char_at_respects_boundaries() {
        let s = "aé b";
        assert_eq!(s.char_at(0), Some('a'));
        assert_eq!(s.char_at(1), Some('é'));
        assert_eq!(s.char_at(2), None);
        assert_eq!(s.char_at(3), Some(' '));
        assert_eq!(s.char_at(10), None);
    }

    #[test]
    fn prefix_and_suffix_stop_on_char_boundaries() {
        assert_eq!(common_prefix_len("abcd", "abxd"), 2);
        assert_eq!(common_suffix_len("abcd", "abxd"), 1);
        // 'é' and 'è' share their first UTF-8 byte
        assert_eq!(common_prefix_len("é", "è"), 0);
        assert_eq!(common_suffix_len("xé", "yé"), 2);
    }

    #[test]
    fn content_eq_crosses_representations() {
        let owned = String::from("abc");
        assert!("abc".content_eq(&owned));
        assert!(owned.starts_with_text("ab"));
        assert!(!owned.starts_with_text("abcd"));
    }

    #[test]
    fn range_of_clamps_reversed_bounds() {
        let range = range_of(5, 3);
        assert_eq!(range.start(), TextSize::from(5));
        assert!(range.is_empty());
    }
}
