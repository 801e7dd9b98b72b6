use super::TextLike;
use std::fmt;

/// A lowercase projection over some text.
///
/// Nothing is copied: every character is lowercased when it is read.
/// Characters whose lowercase form expands to several characters (such as
/// `'İ'`) project to the full expansion in [`TextLike::text_chars`] and to
/// its first character in [`TextLike::char_at`].
#[derive(Clone, Copy)]
pub struct LowerCase<T> {
    inner: T,
}

impl<T: TextLike> LowerCase<T> {
    #[must_use]
    pub const fn new(inner: T) -> Self {
        Self { inner }
    }

    /// The wrapped text, unchanged.
    #[must_use]
    pub const fn get(&self) -> &T {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: TextLike> TextLike for LowerCase<T> {
    /// Length of the underlying text.
    fn text_len(&self) -> usize {
        self.inner.text_len()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.inner
            .char_at(offset)
            .and_then(|c| c.to_lowercase().next())
    }

    fn text_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.inner.text_chars().flat_map(char::to_lowercase)
    }
}

impl<T: TextLike, U: TextLike> PartialEq<LowerCase<U>> for LowerCase<T> {
    fn eq(&self, other: &LowerCase<U>) -> bool {
        self.content_eq(other)
    }
}

impl<T: TextLike> PartialEq<str> for LowerCase<T> {
    fn eq(&self, other: &str) -> bool {
        self.text_chars().eq(other.chars())
    }
}

impl<T: TextLike> fmt::Display for LowerCase<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        self.text_chars().try_for_each(|c| f.write_char(c))
    }
}

impl<T: TextLike> fmt::Debug for LowerCase<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LowerCase({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::StringToken;

    #[test]
    fn projects_lazily_without_touching_the_source() {
        let token = StringToken::owned("WHILE");
        let lower = LowerCase::new(token.clone());
        assert!(lower == *"while");
        assert_eq!(lower.get(), &token);
        assert_eq!(lower.char_at(1), Some('h'));
        assert_eq!(lower.text_len(), 5);
    }

    #[test]
    fn compares_case_insensitively_across_representations() {
        let a = LowerCase::new(StringToken::from_static("Select"));
        let b = LowerCase::new(String::from("SELECT"));
        assert!(a == b);
        assert!(a.starts_with_text("sel"));
        assert_eq!(a.to_string(), "select");
    }
}
