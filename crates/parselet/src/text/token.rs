use super::TextLike;
use compact_str::CompactString;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// An immutable piece of text that is cheap to clone and slice.
///
/// A token is one of three representations:
///
/// - a view `[start, end)` into a shared source buffer (`Arc<str>`),
/// - a `'static` string, used for grammar literals,
/// - an owned [`CompactString`].
///
/// Equality, ordering and hashing are defined on the content and are
/// identical to those of `str`, so a token can be looked up in a hashed
/// collection with a plain `&str` and vice versa.
#[derive(Clone)]
pub struct StringToken {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Shared { buffer: Arc<str>, start: u32, end: u32 },
    Static(&'static str),
    Owned(CompactString),
}

impl StringToken {
    /// Create a view into `buffer`. Construction does not copy.
    ///
    /// Bounds are clamped to the buffer and moved down to the nearest char
    /// boundary.
    #[must_use]
    pub fn shared(buffer: Arc<str>, start: usize, end: usize) -> Self {
        let end = floor_boundary(&buffer, end.min(buffer.len()));
        let start = floor_boundary(&buffer, start.min(end));
        Self {
            repr: Repr::Shared {
                buffer,
                start: to_u32(start),
                end: to_u32(end),
            },
        }
    }

    /// Wrap a `'static` string without copying.
    #[must_use]
    pub const fn from_static(text: &'static str) -> Self {
        Self {
            repr: Repr::Static(text),
        }
    }

    /// Create an owned token.
    #[must_use]
    pub fn owned(text: impl Into<CompactString>) -> Self {
        Self {
            repr: Repr::Owned(text.into()),
        }
    }

    /// The empty token.
    #[must_use]
    pub const fn empty() -> Self {
        Self::from_static("")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match &self.repr {
            Repr::Shared { buffer, start, end } => &buffer[*start as usize..*end as usize],
            Repr::Static(text) => text,
            Repr::Owned(text) => text.as_str(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Shared { start, end, .. } => (*end - *start) as usize,
            Repr::Static(text) => text.len(),
            Repr::Owned(text) => text.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this token is a zero-copy view into `buffer`.
    #[must_use]
    pub fn is_view_of(&self, buffer: &Arc<str>) -> bool {
        matches!(&self.repr, Repr::Shared { buffer: own, .. } if Arc::ptr_eq(own, buffer))
    }

    /// Whether the token borrows its content instead of owning a copy.
    #[must_use]
    pub const fn is_borrowed(&self) -> bool {
        !matches!(self.repr, Repr::Owned(_))
    }

    /// Slice the token with offsets relative to its own start.
    ///
    /// Views and static tokens stay zero-copy. Out-of-range bounds are
    /// clamped.
    #[must_use]
    pub fn substring(&self, start: usize, end: usize) -> Self {
        let len = self.len();
        let end = end.min(len);
        let start = start.min(end);
        match &self.repr {
            Repr::Shared {
                buffer,
                start: base,
                ..
            } => {
                let base = *base as usize;
                Self::shared(buffer.clone(), base + start, base + end)
            }
            Repr::Static(text) => {
                let text: &'static str = text;
                let end = floor_boundary(text, end);
                Self::from_static(&text[floor_boundary(text, start.min(end))..end])
            }
            Repr::Owned(text) => {
                let end = floor_boundary(text, end);
                Self::owned(&text[floor_boundary(text, start.min(end))..end])
            }
        }
    }

    /// Concatenate two tokens.
    ///
    /// Two views of the same buffer whose ranges touch produce a single view;
    /// anything else produces an owned copy.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        if let (
            Repr::Shared {
                buffer: left,
                start,
                end,
            },
            Repr::Shared {
                buffer: right,
                start: next,
                end: last,
            },
        ) = (&self.repr, &other.repr)
            && Arc::ptr_eq(left, right)
            && end == next
        {
            return Self {
                repr: Repr::Shared {
                    buffer: left.clone(),
                    start: *start,
                    end: *last,
                },
            };
        }
        let mut text = CompactString::with_capacity(self.len() + other.len());
        text.push_str(self.as_str());
        text.push_str(other.as_str());
        Self::owned(text)
    }

    /// Detach the content from any shared buffer.
    #[must_use]
    pub fn to_owned_token(&self) -> Self {
        match &self.repr {
            Repr::Shared { .. } => Self::owned(self.as_str()),
            _ => self.clone(),
        }
    }
}

fn to_u32(offset: usize) -> u32 {
    u32::try_from(offset).unwrap_or(u32::MAX)
}

fn floor_boundary(text: &str, mut offset: usize) -> usize {
    offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

impl TextLike for StringToken {
    fn text_len(&self) -> usize {
        self.len()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.as_str().char_at(offset)
    }

    fn text_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.as_str().chars()
    }
}

impl Default for StringToken {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for StringToken {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for StringToken {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for StringToken {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl Hash for StringToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialEq for StringToken {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for StringToken {}

impl PartialOrd for StringToken {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StringToken {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialEq<str> for StringToken {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for StringToken {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<String> for StringToken {
    fn eq(&self, other: &String) -> bool {
        self.as_str() == other.as_str()
    }
}

impl PartialEq<StringToken> for str {
    fn eq(&self, other: &StringToken) -> bool {
        self == other.as_str()
    }
}

impl PartialEq<StringToken> for &str {
    fn eq(&self, other: &StringToken) -> bool {
        *self == other.as_str()
    }
}

impl From<&'static str> for StringToken {
    fn from(text: &'static str) -> Self {
        Self::from_static(text)
    }
}

impl From<String> for StringToken {
    fn from(text: String) -> Self {
        Self::owned(text)
    }
}

impl From<CompactString> for StringToken {
    fn from(text: CompactString) -> Self {
        Self::owned(text)
    }
}

impl fmt::Debug for StringToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for StringToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "serialize")]
impl serde::Serialize for StringToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serialize")]
impl<'de> serde::Deserialize<'de> for StringToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        CompactString::deserialize(deserializer).map(Self::owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::RandomState;
    use std::hash::BuildHasher;

    fn buffer(text: &str) -> Arc<str> {
        Arc::from(text)
    }

    #[test]
    fn shared_views_do_not_copy() {
        let source = buffer("hello world");
        let token = StringToken::shared(source.clone(), 6, 11);
        assert_eq!(token, "world");
        assert!(token.is_view_of(&source));
        assert!(token.is_borrowed());
        assert_eq!(token.len(), 5);
    }

    #[test]
    fn equality_and_hash_match_str_for_every_representation() {
        let source = buffer("xxabcxx");
        let view = StringToken::shared(source, 2, 5);
        let fixed = StringToken::from_static("abc");
        let owned = StringToken::owned("abc");
        let state = RandomState::with_seeds(1, 2, 3, 4);
        let expected = state.hash_one("abc");
        for token in [&view, &fixed, &owned] {
            assert_eq!(*token, "abc");
            assert_eq!(state.hash_one(token), expected);
        }
        assert_eq!(view, owned);
        assert_eq!(fixed, view);
    }

    #[test]
    fn hashed_lookup_by_str() {
        let mut set = hashbrown::HashSet::new();
        set.insert(StringToken::owned("key"));
        assert!(set.contains("key"));
    }

    #[test]
    fn adjacent_views_concat_without_copy() {
        let source = buffer("abcdef");
        let left = StringToken::shared(source.clone(), 0, 3);
        let right = StringToken::shared(source.clone(), 3, 6);
        let joined = left.concat(&right);
        assert_eq!(joined, "abcdef");
        assert!(joined.is_view_of(&source));
    }

    #[test]
    fn disjoint_views_concat_into_owned_copy() {
        let source = buffer("abcdef");
        let left = StringToken::shared(source.clone(), 0, 2);
        let right = StringToken::shared(source.clone(), 4, 6);
        let joined = left.concat(&right);
        assert_eq!(joined, "abef");
        assert!(!joined.is_borrowed());

        let other = buffer("abcdef");
        let foreign = StringToken::shared(other, 2, 4);
        let mixed = left.concat(&foreign);
        assert_eq!(mixed, "abcd");
        assert!(!mixed.is_view_of(&source));
    }

    #[test]
    fn substring_is_relative_and_clamped() {
        let source = buffer("0123456789");
        let token = StringToken::shared(source.clone(), 2, 8);
        let inner = token.substring(1, 4);
        assert_eq!(inner, "345");
        assert!(inner.is_view_of(&source));
        assert_eq!(token.substring(4, 100), "67");
        assert_eq!(token.substring(9, 3), "");
    }

    #[test]
    fn substring_never_splits_a_char() {
        let token = StringToken::owned("aéb");
        assert_eq!(token.substring(0, 2), "a");
        assert_eq!(token.substring(1, 3), "é");
    }

    #[test]
    fn concat_with_empty_keeps_representation() {
        let source = buffer("abc");
        let view = StringToken::shared(source.clone(), 0, 2);
        assert!(view.concat(&StringToken::empty()).is_view_of(&source));
        assert!(StringToken::empty().concat(&view).is_view_of(&source));
    }
}
