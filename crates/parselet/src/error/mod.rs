//! # Error Types
//!
//! Errors for every direction the engine runs in.
//!
//! ## Overview
//!
//! - [`ParseError`]: structured match failures. A failure that an ancestor
//!   recovers from ends up inside an error node; one that reaches the top
//!   is returned with the best partial value found.
//! - [`GenerateError`]: typed reasons a value could not be turned back into
//!   a tree. Always recoverable by trying another alternative.
//! - [`GrammarError`]: problems found while building or mutating a grammar.
//! - [`TreeError`], [`MaskError`], [`DiffError`], [`ValueError`]:
//!   invariant violations and misuse of the tree, mask and value APIs.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, [`ParseError`] implements
//! [`miette::Diagnostic`] with a labelled span.

#[cfg(feature = "diagnostics")]
mod diagnostics;

use crate::grammar::RuleId;
use crate::text::{TextRange, TextSize};
use crate::tree::NodeId;
use crate::value::ValueId;
use compact_str::CompactString;
use std::fmt::Write;
use thiserror::Error;

/// Stable identifier of a parse error kind, with its message template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    Expected,
    UnexpectedEof,
    Unexpected,
    TrailingInput,
    Multiple,
    Budget,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expected => "parse::expected",
            Self::UnexpectedEof => "parse::unexpected_eof",
            Self::Unexpected => "parse::unexpected",
            Self::TrailingInput => "parse::trailing_input",
            Self::Multiple => "parse::multiple",
            Self::Budget => "parse::budget",
        }
    }

    /// Message template; `{0}` is the expected or found text.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::Expected => "expected {0}",
            Self::UnexpectedEof => "unexpected end of input, expected {0}",
            Self::Unexpected => "unexpected {0}",
            Self::TrailingInput => "unexpected trailing input {0}",
            Self::Multiple => "{0} alternatives failed",
            Self::Budget => "parse budget exhausted: {0}",
        }
    }
}

/// Which limit stopped a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BudgetKind {
    Steps,
    Depth,
    Errors,
    /// Input longer than 32-bit offsets can address
    Input,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Steps => "step limit",
            Self::Depth => "nesting limit",
            Self::Errors => "error limit",
            Self::Input => "input size limit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{}", if *at_eof { format!("unexpected end of input, expected {expected}") } else { format!("expected {expected}") })]
    Expected {
        span: TextRange,
        expected: CompactString,
        at_eof: bool,
        rule: Option<RuleId>,
        partial: Option<ValueId>,
    },

    #[error("unexpected {found:?}")]
    Unexpected {
        span: TextRange,
        found: CompactString,
        rule: Option<RuleId>,
        partial: Option<ValueId>,
    },

    #[error("unexpected trailing input {found:?}")]
    TrailingInput {
        span: TextRange,
        found: CompactString,
        partial: Option<ValueId>,
    },

    #[error("{}", ParseError::format_expected_list(errors))]
    Multiple {
        span: TextRange,
        errors: Vec<ParseError>,
        rule: Option<RuleId>,
        partial: Option<ValueId>,
    },

    #[error("parse budget exhausted: {kind}")]
    Budget {
        span: TextRange,
        kind: BudgetKind,
        partial: Option<ValueId>,
    },
}

impl ParseError {
    /// A literal or rule was expected at `span`.
    #[must_use]
    pub fn expected(
        span: TextRange,
        expected: impl Into<CompactString>,
        at_eof: bool,
        rule: Option<RuleId>,
    ) -> Self {
        Self::Expected {
            span,
            expected: expected.into(),
            at_eof,
            rule,
            partial: None,
        }
    }

    #[must_use]
    pub fn unexpected(span: TextRange, found: impl Into<CompactString>, rule: Option<RuleId>) -> Self {
        Self::Unexpected {
            span,
            found: found.into(),
            rule,
            partial: None,
        }
    }

    /// Aggregate sibling failures. A single error is returned as is.
    #[must_use]
    pub fn multiple(mut errors: Vec<Self>, rule: Option<RuleId>) -> Self {
        if errors.len() == 1
            && let Some(only) = errors.pop()
        {
            return only;
        }
        let span = errors
            .iter()
            .map(Self::span)
            .reduce(TextRange::cover)
            .unwrap_or_default();
        Self::Multiple {
            span,
            errors,
            rule,
            partial: None,
        }
    }

    #[must_use]
    pub const fn span(&self) -> TextRange {
        match self {
            Self::Expected { span, .. }
            | Self::Unexpected { span, .. }
            | Self::TrailingInput { span, .. }
            | Self::Multiple { span, .. }
            | Self::Budget { span, .. } => *span,
        }
    }

    /// Where the failure happened; the furthest such position wins when
    /// alternatives compete.
    #[must_use]
    pub const fn position(&self) -> TextSize {
        self.span().start()
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Expected { at_eof: true, .. } => ErrorCode::UnexpectedEof,
            Self::Expected { .. } => ErrorCode::Expected,
            Self::Unexpected { .. } => ErrorCode::Unexpected,
            Self::TrailingInput { .. } => ErrorCode::TrailingInput,
            Self::Multiple { .. } => ErrorCode::Multiple,
            Self::Budget { .. } => ErrorCode::Budget,
        }
    }

    /// The rule that reported the failure.
    #[must_use]
    pub const fn rule(&self) -> Option<RuleId> {
        match self {
            Self::Expected { rule, .. }
            | Self::Unexpected { rule, .. }
            | Self::Multiple { rule, .. } => *rule,
            Self::TrailingInput { .. } | Self::Budget { .. } => None,
        }
    }

    /// Best-effort value built before the failure.
    #[must_use]
    pub const fn partial(&self) -> Option<ValueId> {
        match self {
            Self::Expected { partial, .. }
            | Self::Unexpected { partial, .. }
            | Self::TrailingInput { partial, .. }
            | Self::Multiple { partial, .. }
            | Self::Budget { partial, .. } => *partial,
        }
    }

    /// Attach a partial value unless one is already recorded. Inner
    /// partial values are more specific and win.
    #[must_use]
    pub fn with_partial(mut self, value: Option<ValueId>) -> Self {
        match &mut self {
            Self::Expected { partial, .. }
            | Self::Unexpected { partial, .. }
            | Self::TrailingInput { partial, .. }
            | Self::Multiple { partial, .. }
            | Self::Budget { partial, .. } => {
                if partial.is_none() {
                    *partial = value;
                }
            }
        }
        self
    }

    /// Whether the failure was caused by running out of input.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        match self {
            Self::Expected { at_eof, .. } => *at_eof,
            Self::Multiple { errors, .. } => errors.iter().all(Self::is_eof),
            _ => false,
        }
    }

    /// Every expectation named by this error, flattened.
    #[must_use]
    pub fn expected_list(&self) -> Vec<&str> {
        match self {
            Self::Expected { expected, .. } => vec![expected.as_str()],
            Self::Multiple { errors, .. } => {
                let mut all: Vec<&str> = errors.iter().flat_map(Self::expected_list).collect();
                all.dedup();
                all
            }
            _ => Vec::new(),
        }
    }

    fn format_expected_list(errors: &[Self]) -> String {
        let expected: Vec<&str> = errors.iter().flat_map(Self::expected_list).collect();
        match expected.as_slice() {
            [] => format!("{} alternatives failed", errors.len()),
            [one] => format!("expected {one}"),
            [init @ .., last] => format!("expected {} or {last}", init.join(", ")),
        }
    }

    /// Render the error with a snippet of the surrounding source.
    #[must_use]
    pub fn format_with_context(&self, source: &str) -> String {
        let mut result = self.to_string();
        let span = self.span();
        let start = u32::from(span.start()) as usize;
        if start > source.len() {
            return result;
        }
        let start = floor(source, start);
        let end = floor(source, (u32::from(span.end()) as usize).min(source.len()));
        let line = source[..start].matches('\n').count() + 1;
        let column = start - source[..start].rfind('\n').map_or(0, |i| i + 1) + 1;
        let before_start = floor(source, start.saturating_sub(20));
        let after_end = floor(source, (end + 20).min(source.len()));
        let _ = write!(
            result,
            "\n  at {line}:{column}\n  ...{}[{}]{}...",
            &source[before_start..start],
            source.get(start..end).unwrap_or_default(),
            source.get(end..after_end).unwrap_or_default(),
        );
        result
    }
}

fn floor(source: &str, mut offset: usize) -> usize {
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Summary of one parse.
#[derive(Debug, Default, Clone)]
pub struct ParseMetrics {
    /// Rule entries, counted against the step budget
    pub steps: usize,
    pub nodes_created: usize,
    pub errors_recovered: usize,
    pub parse_time: std::time::Duration,
}

/// Why a value could not be regenerated through a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("no value for required slot {slot:?} of rule {rule}")]
    NoValue {
        rule: RuleId,
        slot: Option<CompactString>,
    },

    #[error("rule {rule} rejected value {value}: {reason}")]
    Rejected {
        rule: RuleId,
        value: ValueId,
        reason: CompactString,
    },

    #[error("rule {rule} consumed {consumed} of {total} list elements")]
    NotEndOfInput {
        rule: RuleId,
        consumed: usize,
        total: usize,
    },

    #[error("value {found:?} does not match literal {expected:?} of rule {rule}")]
    LiteralMismatch {
        rule: RuleId,
        expected: CompactString,
        found: CompactString,
    },

    #[error("no alternative of rule {rule} accepts the value")]
    NoAlternative {
        rule: RuleId,
        last: Option<Box<GenerateError>>,
    },

    #[error("rule {rule} re-entered with value {value} without progress")]
    Cycle { rule: RuleId, value: ValueId },

    #[error("generation nested deeper than {limit}")]
    DepthExceeded { limit: usize },

    #[error(transparent)]
    Mask(#[from] MaskError),
}

impl GenerateError {
    /// Whether this error is a programming error rather than a rejected
    /// alternative.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Mask(_))
    }
}

/// Misuse of the generation mask stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskError {
    #[error("mask popped out of order: expected depth {expected}, stack depth is {found}")]
    Unbalanced { expected: usize, found: usize },

    #[error("mask popped from an empty stack")]
    Empty,

    #[error("{leaked} mask(s) leaked out of a sibling attempt")]
    Leaked { leaked: usize },
}

/// Grammar construction and composition errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("rule `{name}` was declared but never defined")]
    UndefinedRule { name: CompactString },

    #[error("rule {rule} is not part of this grammar")]
    UnknownRule { rule: RuleId },

    #[error("rule name `{name}` is already taken")]
    DuplicateName { name: CompactString },

    #[error("sequence {rule} has more than one pass-through slot")]
    MultiplePassSlots { rule: RuleId },

    #[error("choice {rule} has no alternatives")]
    EmptyChoice { rule: RuleId },

    #[error("chain {rule}: trailer rule produces no object type")]
    UntypedTrailer { rule: RuleId },

    #[error("rule {alternative} is not registered in choice {rule}")]
    UnregisteredAlternative { rule: RuleId, alternative: RuleId },

    #[error("rule {rule} is not a choice")]
    NotAChoice { rule: RuleId },

    #[error("rule {rule} can reach itself without consuming input")]
    LeftRecursion { rule: RuleId },

    #[error("grammar has no entry rule")]
    NoEntry,
}

/// Parse-tree invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {node} starts at {found:?}, expected {expected:?}")]
    InvalidStartIndex {
        node: NodeId,
        expected: TextSize,
        found: TextSize,
    },

    #[error("no node at slot path {path:?}")]
    InvalidPath { path: Vec<usize> },
}

/// Failures of the incremental diff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    #[error("tree contains unresolved formatting placeholders; resolve it before diffing")]
    UnresolvedFormatting,

    #[error("edit range {range:?} is outside the document or splits a character")]
    EditOutOfBounds { range: TextRange },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Value(#[from] ValueError),

    /// The new text does not parse, even as a whole.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Misuse of the semantic tree editing API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("value {value} does not exist")]
    Unknown { value: ValueId },

    #[error("value {value} is not an object")]
    NotAnObject { value: ValueId },

    #[error("value {value} is not a list")]
    NotAList { value: ValueId },

    #[error("value {value} is not text")]
    NotText { value: ValueId },

    #[error("index {index} out of bounds for list {value} of length {len}")]
    IndexOutOfBounds {
        value: ValueId,
        index: usize,
        len: usize,
    },
}
