//! # Parse Node Tree
//!
//! The structural result of a match. Every node records where it starts in
//! the source, which grammar rule produced it, and which semantic value (if
//! any) it is linked to.
//!
//! ## Node variants
//!
//! - [`ParseNode::Leaf`]: literal text
//! - [`ParseNode::Branch`]: ordered, possibly sparse children
//! - [`ParseNode::Format`]: a stateless spacing/newline placeholder produced
//!   by generation and resolved by the format pass
//! - [`ParseNode::Error`]: consumed text that did not match, plus an optional
//!   re-synchronised node
//! - [`ParseNode::Partial`]: a production that stopped early; its value is
//!   partial
//!
//! ## Invariants
//!
//! A node's length is the sum of its children's lengths, and each child
//! starts where its previous sibling ends. Placeholders have length zero
//! until they are resolved. [`ParseNode::check_offsets`] verifies both.
//!
//! ## Links to the semantic tree
//!
//! Nodes refer to semantic values by [`ValueId`]. At most one node owns a
//! given value (`owns_value`); the reverse link lives in
//! [`SemanticTree`](crate::value::SemanticTree) as a table keyed by handle.

mod compare;
mod ops;
mod walk;

pub use walk::{Preorder, TextPieces, TextPiece};

use crate::error::ParseError;
use crate::grammar::RuleId;
use crate::text::{StringToken, TextSize};
use crate::value::ValueId;
use std::fmt;

/// Identity of a parse node, unique within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocator for [`NodeId`]s. One per document; ids are never reused.
#[derive(Debug, Default, Clone)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Number of ids handed out so far.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.next
    }
}

/// Formatting placeholder kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Placeholder {
    /// Optional horizontal space, decided by the spacing rule table
    Space,
    /// Line break followed by the current indentation
    Newline,
}

/// Data shared by every non-placeholder node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHeader {
    pub(crate) id: NodeId,
    pub(crate) start: TextSize,
    pub(crate) provisional: Option<TextSize>,
    pub(crate) rule: Option<RuleId>,
    pub(crate) value: Option<ValueId>,
    pub(crate) owns_value: bool,
    pub(crate) generated: bool,
    /// Bytes from `start` on that the parse had already looked at when
    /// this node's match began. `None` when unknown.
    pub(crate) read_ahead: Option<TextSize>,
}

impl NodeHeader {
    #[must_use]
    pub const fn new(id: NodeId, start: TextSize, rule: Option<RuleId>) -> Self {
        Self {
            id,
            start,
            provisional: None,
            rule,
            value: None,
            owns_value: false,
            generated: false,
            read_ahead: None,
        }
    }

    #[must_use]
    pub const fn with_value(mut self, value: Option<ValueId>, owns: bool) -> Self {
        self.value = value;
        self.owns_value = owns && value.is_some();
        self
    }

    #[must_use]
    pub const fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn start(&self) -> TextSize {
        self.start
    }

    /// Shadow offset assigned during an incremental reparse, before commit.
    #[must_use]
    pub const fn provisional(&self) -> Option<TextSize> {
        self.provisional
    }

    #[must_use]
    pub const fn rule(&self) -> Option<RuleId> {
        self.rule
    }

    #[must_use]
    pub const fn value(&self) -> Option<ValueId> {
        self.value
    }

    #[must_use]
    pub const fn owns_value(&self) -> bool {
        self.owns_value
    }

    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.generated
    }

    /// How far past its start the surrounding parse had read before this
    /// node was matched. A reparse may only reuse the node's context when
    /// an edit starts beyond that point.
    #[must_use]
    pub const fn read_ahead(&self) -> Option<TextSize> {
        self.read_ahead
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub(crate) header: NodeHeader,
    pub(crate) text: StringToken,
}

impl LeafNode {
    #[must_use]
    pub const fn new(header: NodeHeader, text: StringToken) -> Self {
        Self { header, text }
    }

    #[must_use]
    pub const fn token(&self) -> &StringToken {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNode {
    pub(crate) header: NodeHeader,
    pub(crate) children: Vec<Option<ParseNode>>,
}

impl BranchNode {
    #[must_use]
    pub const fn new(header: NodeHeader, children: Vec<Option<ParseNode>>) -> Self {
        Self { header, children }
    }

    /// Child slots, including empty ones.
    #[must_use]
    pub fn slots(&self) -> &[Option<ParseNode>] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    pub(crate) header: NodeHeader,
    pub(crate) error: Box<ParseError>,
    pub(crate) text: StringToken,
    pub(crate) value: Option<Box<ParseNode>>,
}

impl ErrorNode {
    #[must_use]
    pub fn new(
        header: NodeHeader,
        error: ParseError,
        text: StringToken,
        value: Option<ParseNode>,
    ) -> Self {
        Self {
            header,
            error: Box::new(error),
            text,
            value: value.map(Box::new),
        }
    }

    #[must_use]
    pub fn error(&self) -> &ParseError {
        &self.error
    }

    /// The text consumed while recovering, exactly as it appeared in the
    /// source.
    #[must_use]
    pub const fn error_text(&self) -> &StringToken {
        &self.text
    }

    /// The node that matched after the skipped text, if any.
    #[must_use]
    pub fn resynced(&self) -> Option<&ParseNode> {
        self.value.as_deref()
    }
}

/// A node in the parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseNode {
    Leaf(LeafNode),
    Branch(BranchNode),
    Format(Placeholder),
    Error(ErrorNode),
    Partial(BranchNode),
}

impl ParseNode {
    #[must_use]
    pub const fn leaf(header: NodeHeader, text: StringToken) -> Self {
        Self::Leaf(LeafNode::new(header, text))
    }

    #[must_use]
    pub const fn branch(header: NodeHeader, children: Vec<Option<Self>>) -> Self {
        Self::Branch(BranchNode::new(header, children))
    }

    #[must_use]
    pub const fn partial(header: NodeHeader, children: Vec<Option<Self>>) -> Self {
        Self::Partial(BranchNode::new(header, children))
    }

    #[must_use]
    pub fn error(
        header: NodeHeader,
        error: ParseError,
        text: StringToken,
        value: Option<Self>,
    ) -> Self {
        Self::Error(ErrorNode::new(header, error, text, value))
    }

    #[must_use]
    pub const fn header(&self) -> Option<&NodeHeader> {
        match self {
            Self::Leaf(leaf) => Some(&leaf.header),
            Self::Branch(branch) | Self::Partial(branch) => Some(&branch.header),
            Self::Error(error) => Some(&error.header),
            Self::Format(_) => None,
        }
    }

    pub(crate) const fn header_mut(&mut self) -> Option<&mut NodeHeader> {
        match self {
            Self::Leaf(leaf) => Some(&mut leaf.header),
            Self::Branch(branch) | Self::Partial(branch) => Some(&mut branch.header),
            Self::Error(error) => Some(&mut error.header),
            Self::Format(_) => None,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        self.header().map(NodeHeader::id)
    }

    #[must_use]
    pub fn rule(&self) -> Option<RuleId> {
        self.header().and_then(NodeHeader::rule)
    }

    /// The semantic value linked to this node, owned or passed through.
    #[must_use]
    pub fn value(&self) -> Option<ValueId> {
        self.header().and_then(NodeHeader::value)
    }

    #[must_use]
    pub fn owned_value(&self) -> Option<ValueId> {
        self.header().filter(|h| h.owns_value).and_then(NodeHeader::value)
    }

    /// Start offset. Placeholders carry no position and report zero.
    #[must_use]
    pub fn start(&self) -> TextSize {
        self.header().map_or_else(TextSize::default, NodeHeader::start)
    }

    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Partial(_))
    }

    #[must_use]
    pub const fn as_error(&self) -> Option<&ErrorNode> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Child slots of branches and partial nodes; empty for everything else.
    #[must_use]
    pub fn slots(&self) -> &[Option<Self>] {
        match self {
            Self::Branch(branch) | Self::Partial(branch) => &branch.children,
            _ => &[],
        }
    }

    /// Present children in order. For an error node this is the
    /// re-synchronised node, if any.
    pub fn children(&self) -> impl Iterator<Item = &Self> {
        let error_child = match self {
            Self::Error(error) => error.value.as_deref(),
            _ => None,
        };
        self.slots().iter().flatten().chain(error_child)
    }
}
