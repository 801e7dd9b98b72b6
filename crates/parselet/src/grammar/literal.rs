//! Literal and character-class matchers.

use crate::text::{LowerCase, StringToken, TextLike};
use compact_str::{CompactString, format_compact};
use smallvec::SmallVec;

/// What a literal matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// A fixed string
    Text(StringToken),
    /// Any single character
    AnyChar,
    /// End of input; matches without consuming and produces no value
    Eof,
}

/// A literal matcher with an optional exclusion set.
///
/// Exclusions reject a match when the input continues with one of the
/// excluded strings, e.g. `%` excluding `%>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pattern: Pattern,
    excludes: SmallVec<[StringToken; 2]>,
    ignore_case: bool,
    word: bool,
}

impl Literal {
    #[must_use]
    pub fn text(text: impl Into<StringToken>) -> Self {
        Self {
            pattern: Pattern::Text(text.into()),
            excludes: SmallVec::new(),
            ignore_case: false,
            word: false,
        }
    }

    /// A literal that only matches as a whole word: it fails when the input
    /// continues with an identifier character, so `if` does not match `iffy`.
    #[must_use]
    pub fn keyword(text: impl Into<StringToken>) -> Self {
        Self {
            word: true,
            ..Self::text(text)
        }
    }

    #[must_use]
    pub fn any_char() -> Self {
        Self {
            pattern: Pattern::AnyChar,
            excludes: SmallVec::new(),
            ignore_case: false,
            word: false,
        }
    }

    #[must_use]
    pub fn eof() -> Self {
        Self {
            pattern: Pattern::Eof,
            excludes: SmallVec::new(),
            ignore_case: false,
            word: false,
        }
    }

    #[must_use]
    pub fn excluding(mut self, text: impl Into<StringToken>) -> Self {
        self.excludes.push(text.into());
        self
    }

    #[must_use]
    pub const fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    #[must_use]
    pub const fn is_case_insensitive(&self) -> bool {
        self.ignore_case
    }

    /// The fixed text, if this literal has one.
    #[must_use]
    pub const fn as_text(&self) -> Option<&StringToken> {
        match &self.pattern {
            Pattern::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Byte length matched at `offset`, or `None`.
    #[must_use]
    pub fn match_at(&self, input: &str, offset: usize) -> Option<usize> {
        let rest = input.get(offset..)?;
        let len = match &self.pattern {
            Pattern::Eof => return rest.is_empty().then_some(0),
            Pattern::AnyChar => rest.chars().next()?.len_utf8(),
            Pattern::Text(text) => {
                let candidate = rest.get(..text.len())?;
                let matched = if self.ignore_case {
                    LowerCase::new(candidate).content_eq(&LowerCase::new(text.as_str()))
                } else {
                    candidate == text.as_str()
                };
                if !matched {
                    return None;
                }
                text.len()
            }
        };
        if self.word && rest[len..].chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        let excluded = self
            .excludes
            .iter()
            .any(|ex| ex.len() > len && rest.starts_with(ex.as_str()));
        (!excluded).then_some(len)
    }

    /// End of the input `match_at` looks at from `offset`. Looking past
    /// the end of input counts as one byte beyond it.
    #[must_use]
    pub fn examined_end(&self, input: &str, offset: usize) -> usize {
        let rest = input.get(offset..).unwrap_or_default();
        let (read, len) = match &self.pattern {
            Pattern::Eof => (peek(rest, 0), 0),
            Pattern::AnyChar => (peek(rest, 0), peek(rest, 0).min(rest.len())),
            Pattern::Text(text) if self.ignore_case => (text.len().min(rest.len() + 1), text.len()),
            Pattern::Text(text) => {
                let common = common_prefix(rest, text.as_str());
                if common < text.len() {
                    return offset + common + 1;
                }
                (text.len(), text.len())
            }
        };
        let mut read = read;
        if self.word {
            read = read.max(peek(rest, len));
        }
        for excluded in &self.excludes {
            if excluded.len() > len {
                read = read.max((common_prefix(rest, excluded.as_str()) + 1).min(excluded.len()));
            }
        }
        offset + read
    }

    /// Upper bound on the bytes past its offset any single `match_at`
    /// looks at.
    #[must_use]
    pub fn reach(&self) -> usize {
        let text = match &self.pattern {
            Pattern::Text(text) => text.len(),
            Pattern::AnyChar | Pattern::Eof => 4,
        };
        let excluded = self.excludes.iter().map(StringToken::len).max().unwrap_or(0);
        text.max(excluded) + if self.word { 4 } else { 0 }
    }

    /// Whether `text` as a whole is one match (or, with `repeat`, a run of
    /// matches) of this literal.
    #[must_use]
    pub fn accepts(&self, text: &str, repeat: bool) -> bool {
        let mut offset = 0;
        loop {
            match self.match_at(text, offset) {
                Some(0) | None => return offset == text.len() && offset > 0,
                Some(len) => offset += len,
            }
            if !repeat || offset == text.len() {
                return offset == text.len();
            }
        }
    }

    /// Length of the input at `offset` that does not start a match of this
    /// literal: one character, or with `repeat` the longest such run.
    #[must_use]
    pub fn negated_run(&self, input: &str, offset: usize, repeat: bool) -> usize {
        let Some(rest) = input.get(offset..) else {
            return 0;
        };
        if !repeat {
            return match rest.chars().next() {
                Some(c) if self.match_at(input, offset).is_none() => c.len_utf8(),
                _ => 0,
            };
        }
        match &self.pattern {
            Pattern::Text(text) if !self.ignore_case && self.excludes.is_empty() && !text.is_empty() => {
                memchr::memmem::find(rest.as_bytes(), text.as_bytes()).unwrap_or(rest.len())
            }
            Pattern::Eof => rest.len(),
            _ => {
                let mut run = 0;
                for (index, c) in rest.char_indices() {
                    if self.match_at(input, offset + index).is_some() {
                        break;
                    }
                    run = index + c.len_utf8();
                }
                run
            }
        }
    }

    /// Human-readable expectation used in error messages.
    #[must_use]
    pub fn describe(&self) -> CompactString {
        match &self.pattern {
            Pattern::Text(text) => format_compact!("{:?}", text.as_str()),
            Pattern::AnyChar => "any character".into(),
            Pattern::Eof => "end of input".into(),
        }
    }
}

/// End of the character at `at`, or one past the end of input.
fn peek(rest: &str, at: usize) -> usize {
    at + rest.get(at..).and_then(|r| r.chars().next()).map_or(1, char::len_utf8)
}

fn common_prefix(rest: &str, text: &str) -> usize {
    rest.bytes().zip(text.bytes()).take_while(|(a, b)| a == b).count()
}

/// A set of character ranges, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharSet {
    ranges: SmallVec<[(char, char); 4]>,
    negated: bool,
}

impl CharSet {
    #[must_use]
    pub fn new(ranges: impl IntoIterator<Item = (char, char)>) -> Self {
        Self {
            ranges: ranges.into_iter().collect(),
            negated: false,
        }
    }

    #[must_use]
    pub fn single(c: char) -> Self {
        Self::new([(c, c)])
    }

    #[must_use]
    pub fn chars(chars: &str) -> Self {
        Self::new(chars.chars().map(|c| (c, c)))
    }

    #[must_use]
    pub fn digits() -> Self {
        Self::new([('0', '9')])
    }

    /// Horizontal and vertical ASCII whitespace.
    #[must_use]
    pub fn whitespace() -> Self {
        Self::chars(" \t\r\n")
    }

    #[must_use]
    pub fn identifier_start() -> Self {
        Self::new([('a', 'z'), ('A', 'Z'), ('_', '_')])
    }

    #[must_use]
    pub fn identifier() -> Self {
        Self::identifier_start().union(&Self::digits())
    }

    #[must_use]
    pub fn union(mut self, other: &Self) -> Self {
        self.ranges.extend(other.ranges.iter().copied());
        self
    }

    #[must_use]
    pub const fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    #[must_use]
    pub fn matches(&self, c: char) -> bool {
        let inside = self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
        inside != self.negated
    }

    /// Byte length of the character at `offset` if it belongs to the set.
    #[must_use]
    pub fn match_at(&self, input: &str, offset: usize) -> Option<usize> {
        let c = input.get(offset..)?.chars().next()?;
        self.matches(c).then(|| c.len_utf8())
    }

    #[must_use]
    pub fn describe(&self) -> CompactString {
        let mut out = CompactString::new(if self.negated { "[^" } else { "[" });
        for &(lo, hi) in &self.ranges {
            if lo == hi {
                out.extend(lo.escape_debug());
            } else {
                out.extend(lo.escape_debug());
                out.push('-');
                out.extend(hi.escape_debug());
            }
        }
        out.push(']');
        out
    }
}

/// Fast prefix peek over a fixed set of keys.
///
/// Keys are bucketed by their first byte so a lookup inspects one byte of
/// input and then only the keys that can possibly match.
#[derive(Debug, Clone, Default)]
pub struct LiteralSet {
    keys: Vec<StringToken>,
    by_first_byte: hashbrown::HashMap<u8, SmallVec<[usize; 4]>, ahash::RandomState>,
}

impl LiteralSet {
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = StringToken>) -> Self {
        let mut set = Self::default();
        for key in keys {
            set.insert(key);
        }
        set
    }

    pub fn insert(&mut self, key: StringToken) {
        if key.is_empty() || self.keys.contains(&key) {
            return;
        }
        let index = self.keys.len();
        if let Some(&first) = key.as_bytes().first() {
            self.by_first_byte.entry(first).or_default().push(index);
        }
        self.keys.push(key);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// End of the input `prefixes_at` looks at from `offset`.
    #[must_use]
    pub fn examined_end(&self, input: &str, offset: usize) -> usize {
        let rest = input.get(offset..).unwrap_or_default();
        let read = rest
            .as_bytes()
            .first()
            .and_then(|first| self.by_first_byte.get(first))
            .into_iter()
            .flatten()
            .map(|&index| {
                let key = self.keys[index].as_str();
                let common = common_prefix(rest, key);
                if common == key.len() { common } else { common + 1 }
            })
            .max()
            .unwrap_or(0);
        offset + read.max(1)
    }

    /// Every key the input at `offset` starts with.
    pub fn prefixes_at<'a>(&'a self, input: &'a str, offset: usize) -> impl Iterator<Item = &'a StringToken> + 'a {
        let rest = input.get(offset..).unwrap_or_default();
        rest.as_bytes()
            .first()
            .and_then(|first| self.by_first_byte.get(first))
            .into_iter()
            .flatten()
            .map(|&index| &self.keys[index])
            .filter(move |key| rest.starts_with(key.as_str()))
    }
}
