//! Spacing and indentation policy.

use compact_str::CompactString;
use smallvec::{SmallVec, smallvec};

/// Coarse classification of a character for spacing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum CharClass {
    /// Letters, digits and `_`
    Word,
    /// `(` and `[`
    Open,
    /// `)` and `]`
    Close,
    BlockOpen,
    BlockClose,
    Dot,
    Comma,
    Semicolon,
    Colon,
    Less,
    Greater,
    /// `"`, `'` and `` ` ``
    Quote,
    /// Any other punctuation
    Operator,
    Whitespace,
    Other,
}

impl CharClass {
    #[must_use]
    pub fn of(c: char) -> Self {
        match c {
            '_' => Self::Word,
            c if c.is_alphanumeric() => Self::Word,
            c if c.is_whitespace() => Self::Whitespace,
            '(' | '[' => Self::Open,
            ')' | ']' => Self::Close,
            '{' => Self::BlockOpen,
            '}' => Self::BlockClose,
            '.' => Self::Dot,
            ',' => Self::Comma,
            ';' => Self::Semicolon,
            ':' => Self::Colon,
            '<' => Self::Less,
            '>' => Self::Greater,
            '"' | '\'' | '`' => Self::Quote,
            c if c.is_ascii_punctuation() => Self::Operator,
            _ => Self::Other,
        }
    }
}

/// Which characters a rule side applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum CharPattern {
    Any,
    Class(CharClass),
    Char(char),
}

impl CharPattern {
    #[must_use]
    pub fn matches(self, c: char) -> bool {
        match self {
            Self::Any => true,
            Self::Class(class) => CharClass::of(c) == class,
            Self::Char(expected) => c == expected,
        }
    }
}

/// Constraint on the kind of the innermost semantic object around a
/// placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum KindContext {
    #[default]
    Any,
    /// Inside one of [`FormatPolicy::type_parameter_kinds`]
    TypeParameter,
    /// Anywhere else
    NotTypeParameter,
}

/// One row of the spacing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SpacingRule {
    pub prev: CharPattern,
    pub next: CharPattern,
    pub context: KindContext,
    /// Whether a space is inserted when the rule applies
    pub space: bool,
}

impl SpacingRule {
    #[must_use]
    pub const fn space(prev: CharPattern, next: CharPattern) -> Self {
        Self {
            prev,
            next,
            context: KindContext::Any,
            space: true,
        }
    }

    #[must_use]
    pub const fn none(prev: CharPattern, next: CharPattern) -> Self {
        Self {
            prev,
            next,
            context: KindContext::Any,
            space: false,
        }
    }

    #[must_use]
    pub const fn within(mut self, context: KindContext) -> Self {
        self.context = context;
        self
    }

    fn applies(&self, prev: char, next: char, type_parameter: bool) -> bool {
        let context = match self.context {
            KindContext::Any => true,
            KindContext::TypeParameter => type_parameter,
            KindContext::NotTypeParameter => !type_parameter,
        };
        context && self.prev.matches(prev) && self.next.matches(next)
    }
}

/// How placeholders are resolved into whitespace.
///
/// Spacing rules are ordered; the first rule that applies decides. When
/// none applies no space is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FormatPolicy {
    /// One level of indentation
    pub indent: CompactString,
    /// Tokens that open an indented block
    pub block_open: SmallVec<[CompactString; 2]>,
    /// Tokens that close one
    pub block_close: SmallVec<[CompactString; 2]>,
    /// Object kinds whose `<` and `>` are brackets rather than operators
    pub type_parameter_kinds: Vec<CompactString>,
    pub spacing_rules: Vec<SpacingRule>,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::c_like()
    }
}

impl FormatPolicy {
    /// Braces for blocks, four-space indentation and conventional spacing
    /// for C-family punctuation.
    #[must_use]
    pub fn c_like() -> Self {
        use CharClass::{
            BlockClose, BlockOpen, Close, Colon, Comma, Dot, Greater, Less, Open, Operator, Quote, Semicolon, Word,
        };
        use CharPattern::{Any, Class};
        let tp = KindContext::TypeParameter;
        Self {
            indent: "    ".into(),
            block_open: smallvec!["{".into()],
            block_close: smallvec!["}".into()],
            type_parameter_kinds: Vec::new(),
            spacing_rules: vec![
                SpacingRule::none(Any, Class(Semicolon)),
                SpacingRule::none(Any, Class(Comma)),
                SpacingRule::space(Class(Comma), Any),
                SpacingRule::space(Class(Semicolon), Any),
                SpacingRule::none(Any, Class(Dot)),
                SpacingRule::none(Class(Dot), Any),
                SpacingRule::none(Class(Open), Any),
                SpacingRule::none(Any, Class(Close)),
                SpacingRule::none(Class(Word), Class(Open)),
                SpacingRule::none(Class(Close), Class(Open)),
                SpacingRule::none(Any, Class(Less)).within(tp),
                SpacingRule::none(Class(Less), Any).within(tp),
                SpacingRule::none(Any, Class(Greater)).within(tp),
                SpacingRule::none(Class(Greater), Class(Open)).within(tp),
                SpacingRule::space(Any, Class(BlockOpen)),
                SpacingRule::space(Class(BlockOpen), Any),
                SpacingRule::space(Any, Class(BlockClose)),
                SpacingRule::space(Class(BlockClose), Any),
                SpacingRule::none(Any, Class(Colon)),
                SpacingRule::space(Class(Colon), Any),
                SpacingRule::space(Class(Word), Class(Word)),
                SpacingRule::space(Class(Word), Class(Quote)),
                SpacingRule::space(Class(Quote), Class(Word)),
                SpacingRule::space(Class(Operator), Any),
                SpacingRule::space(Any, Class(Operator)),
                SpacingRule::space(Class(Less), Any),
                SpacingRule::space(Any, Class(Less)),
                SpacingRule::space(Class(Greater), Any),
                SpacingRule::space(Any, Class(Greater)),
            ],
        }
    }

    #[must_use]
    pub fn with_type_parameter_kind(mut self, kind: impl Into<CompactString>) -> Self {
        self.type_parameter_kinds.push(kind.into());
        self
    }

    /// Whether a space goes between `prev` and `next` inside an object of
    /// kind `enclosing`.
    #[must_use]
    pub fn wants_space(&self, prev: char, next: char, enclosing: Option<&str>) -> bool {
        let type_parameter =
            enclosing.is_some_and(|kind| self.type_parameter_kinds.iter().any(|known| known == kind));
        self.spacing_rules
            .iter()
            .find(|rule| rule.applies(prev, next, type_parameter))
            .is_some_and(|rule| rule.space)
    }

    #[must_use]
    pub fn opens_block(&self, token: &str) -> bool {
        self.block_open.iter().any(|open| open == token)
    }

    #[must_use]
    pub fn closes_block(&self, token: &str) -> bool {
        self.block_close.iter().any(|close| close == token)
    }

    /// Whether `c` starts a block-closing token.
    pub(super) fn is_closing_char(&self, c: char) -> bool {
        self.block_close.iter().any(|close| close.starts_with(c))
    }

    pub(super) fn is_opening_char(&self, c: char) -> bool {
        self.block_open.iter().any(|open| open.ends_with(c))
    }
}
