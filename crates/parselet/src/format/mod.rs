//! # Formatting
//!
//! Parsed trees already hold their whitespace as ordinary leaves, so they
//! format to exactly the text they were parsed from. Generated trees hold
//! [`Placeholder`]s instead, and this pass decides what each one becomes.
//!
//! ## Spacing
//!
//! A [`Placeholder::Space`] looks at the character emitted just before it
//! and the next character any later leaf will emit, and asks the
//! [`FormatPolicy`] spacing table. Rules may be restricted to the kind of
//! the innermost semantic object around the placeholder, which is how `<`
//! is told apart in `List<T>` and in `a < b`.
//!
//! ## Lines and indentation
//!
//! A [`Placeholder::Newline`] breaks the line and indents to the current
//! block depth. Block-opening tokens push a level, block-closing tokens
//! pop one, and a newline right before a closing token is already
//! dedented. Newlines are dropped at the start and end of output, between
//! an opening token and its closing token, and on a line that is still
//! blank, so runs of placeholders never produce blank lines.
//!
//! ```rust
//! use parselet::format::{FormatPolicy, Formatter};
//! use parselet::grammar::{CharSet, GrammarBuilder, Parselet, Slot};
//! use parselet::generate::Generator;
//! use parselet::tree::NodeIds;
//! use parselet::value::SemanticTree;
//!
//! let mut g = GrammarBuilder::new();
//! let name = g.add(Parselet::char_class(CharSet::identifier()).repeat());
//! let space = g.space();
//! let eq = g.literal("=");
//! let assign = g.sequence("Assign", [
//!     Slot::property("target", name), Slot::syntax(space), Slot::syntax(eq),
//!     Slot::syntax(space), Slot::property("source", name),
//! ]);
//! g.entry(assign);
//! let grammar = g.build().unwrap();
//!
//! let mut values = SemanticTree::new();
//! let object = values.object("Assign");
//! let x = values.text("x");
//! let y = values.text("y");
//! values.set_field(object, "target", Some(x)).unwrap();
//! values.set_field(object, "source", Some(y)).unwrap();
//! let generated = Generator::new(&grammar)
//!     .generate(&mut values, object, assign, &mut NodeIds::new())
//!     .unwrap();
//!
//! let policy = FormatPolicy::c_like();
//! assert_eq!(Formatter::new(&policy, &values).format(&generated.root), "x = y");
//! ```

mod policy;
mod style;

pub use policy::{CharClass, CharPattern, FormatPolicy, KindContext, SpacingRule};
pub use style::{HtmlSink, StyleSink};

use crate::grammar::{Grammar, Parselet};
use crate::text::{StringToken, TextSize};
use crate::tree::{BranchNode, ErrorNode, LeafNode, NodeHeader, NodeIds, ParseNode, Placeholder};
use crate::value::SemanticTree;
use compact_str::CompactString;
use std::collections::VecDeque;

/// Resolves placeholders using a [`FormatPolicy`].
///
/// The semantic tree supplies the kinds of the objects around each
/// placeholder.
#[derive(Debug, Clone, Copy)]
pub struct Formatter<'p> {
    policy: &'p FormatPolicy,
    values: &'p SemanticTree,
}

/// Flattened view of a tree: literal text and the placeholders between it.
#[derive(Debug, Clone, Copy)]
enum Piece<'t> {
    Text(&'t str),
    /// A space placeholder and the kind of its innermost enclosing object
    Space(Option<&'t str>),
    Newline,
}

/// Rendered text and the whitespace chosen for each placeholder, in
/// document order.
struct Layout {
    text: String,
    fills: VecDeque<CompactString>,
}

impl<'p> Formatter<'p> {
    #[must_use]
    pub const fn new(policy: &'p FormatPolicy, values: &'p SemanticTree) -> Self {
        Self { policy, values }
    }

    #[must_use]
    pub const fn policy(&self) -> &'p FormatPolicy {
        self.policy
    }

    /// Render `root` with every placeholder resolved.
    #[must_use]
    pub fn format(&self, root: &ParseNode) -> String {
        self.layout(root).text
    }

    /// A copy of `root` whose placeholders are replaced by whitespace
    /// leaves (or dropped when they resolve to nothing), with offsets
    /// re-threaded from zero and generation marks cleared.
    ///
    /// The result is indistinguishable from a parse of the formatted text
    /// and can be diffed against incrementally.
    #[must_use]
    pub fn resolve(&self, root: &ParseNode, ids: &mut NodeIds) -> ParseNode {
        let mut layout = self.layout(root);
        let mut offset = TextSize::default();
        let resolved = rebuild(root, &mut layout.fills, &mut offset, ids);
        resolved.unwrap_or_else(|| {
            // A root that is itself a placeholder resolving to nothing.
            ParseNode::branch(NodeHeader::new(ids.next_id(), TextSize::default(), None), Vec::new())
        })
    }

    /// Stream `root` into `sink` with rule styles from `grammar`.
    ///
    /// Branches whose rule has a style are bracketed by `style_start` and
    /// `style_end`; leaves carry their rule's style on the string itself.
    /// Resolved whitespace is passed unstyled and unescaped. Skipped error
    /// text is wrapped in an `error` style described by the error message.
    pub fn format_styled(&self, root: &ParseNode, grammar: &Grammar, sink: &mut dyn StyleSink) {
        let mut layout = self.layout(root);
        emit_styled(root, grammar, &mut layout.fills, sink);
    }

    fn layout(&self, root: &ParseNode) -> Layout {
        let mut pieces = Vec::new();
        self.flatten(root, &mut Vec::new(), &mut pieces);

        let mut text = String::new();
        let mut fills = VecDeque::new();
        let mut level = 0usize;
        for (i, piece) in pieces.iter().enumerate() {
            let rest = &pieces[i + 1..];
            match *piece {
                Piece::Text(chunk) => {
                    text.push_str(chunk);
                    let token = chunk.trim();
                    if self.policy.opens_block(token) {
                        level += 1;
                    } else if self.policy.closes_block(token) {
                        level = level.saturating_sub(1);
                    }
                }
                Piece::Space(kind) => {
                    let fill = self.space(&text, rest, kind);
                    text.push_str(fill);
                    fills.push_back(fill.into());
                }
                Piece::Newline => {
                    let fill = self.newline(&text, rest, level);
                    text.push_str(&fill);
                    fills.push_back(fill);
                }
            }
        }
        Layout { text, fills }
    }

    fn flatten<'t>(&'t self, node: &'t ParseNode, kinds: &mut Vec<&'t str>, out: &mut Vec<Piece<'t>>) {
        let kind = node.value().and_then(|value| self.values.kind(value));
        if let Some(kind) = kind {
            kinds.push(kind);
        }
        match node {
            ParseNode::Leaf(leaf) => out.push(Piece::Text(leaf.text.as_str())),
            ParseNode::Format(Placeholder::Space) => out.push(Piece::Space(kinds.last().copied())),
            ParseNode::Format(Placeholder::Newline) => out.push(Piece::Newline),
            ParseNode::Branch(branch) | ParseNode::Partial(branch) => {
                for child in branch.children.iter().flatten() {
                    self.flatten(child, kinds, out);
                }
            }
            ParseNode::Error(error) => {
                out.push(Piece::Text(error.text.as_str()));
                if let Some(value) = error.value.as_deref() {
                    self.flatten(value, kinds, out);
                }
            }
        }
        if kind.is_some() {
            kinds.pop();
        }
    }

    fn space(&self, text: &str, rest: &[Piece<'_>], kind: Option<&str>) -> &'static str {
        let Some(prev) = text.chars().next_back() else {
            return "";
        };
        let Lookahead::Char(next) = lookahead(rest, false) else {
            return "";
        };
        if prev.is_whitespace() || next.is_whitespace() || !self.policy.wants_space(prev, next, kind) {
            return "";
        }
        " "
    }

    fn newline(&self, text: &str, rest: &[Piece<'_>], level: usize) -> CompactString {
        let Lookahead::Char(next) = lookahead(rest, true) else {
            return CompactString::default();
        };
        let line_start = text.rfind('\n').map_or(0, |i| i + 1);
        let blank_line = line_start > 0 && text[line_start..].trim().is_empty();
        if text.is_empty() || blank_line || next.is_whitespace() {
            return CompactString::default();
        }
        let closing = self.policy.is_closing_char(next);
        let prev = text.trim_end().chars().next_back();
        if closing && prev.is_some_and(|c| self.policy.is_opening_char(c)) {
            return CompactString::default();
        }
        let depth = if closing { level.saturating_sub(1) } else { level };
        let mut fill = CompactString::with_capacity(1 + depth * self.policy.indent.len());
        fill.push('\n');
        for _ in 0..depth {
            fill.push_str(&self.policy.indent);
        }
        fill
    }
}

enum Lookahead {
    Char(char),
    /// A newline placeholder comes before any more text
    Newline,
    End,
}

/// The first character later text will emit. With `through_lines`, newline
/// placeholders are looked past.
fn lookahead(rest: &[Piece<'_>], through_lines: bool) -> Lookahead {
    for piece in rest {
        match piece {
            Piece::Text(text) => {
                if let Some(c) = text.chars().next() {
                    return Lookahead::Char(c);
                }
            }
            Piece::Space(_) => {}
            Piece::Newline if through_lines => {}
            Piece::Newline => return Lookahead::Newline,
        }
    }
    Lookahead::End
}

fn rebuild(
    node: &ParseNode,
    fills: &mut VecDeque<CompactString>,
    offset: &mut TextSize,
    ids: &mut NodeIds,
) -> Option<ParseNode> {
    match node {
        ParseNode::Format(_) => {
            let fill = fills.pop_front().unwrap_or_default();
            if fill.is_empty() {
                return None;
            }
            let header = NodeHeader::new(ids.next_id(), *offset, None);
            *offset += TextSize::of(fill.as_str());
            Some(ParseNode::leaf(header, StringToken::owned(fill)))
        }
        ParseNode::Leaf(leaf) => {
            let header = header_at(&leaf.header, *offset);
            *offset += TextSize::of(leaf.text.as_str());
            Some(ParseNode::Leaf(LeafNode::new(header, leaf.text.clone())))
        }
        ParseNode::Branch(branch) | ParseNode::Partial(branch) => {
            let header = header_at(&branch.header, *offset);
            let children = branch
                .children
                .iter()
                .map(|child| child.as_ref().and_then(|child| rebuild(child, fills, offset, ids)))
                .collect();
            let rebuilt = BranchNode::new(header, children);
            Some(if node.is_partial() {
                ParseNode::Partial(rebuilt)
            } else {
                ParseNode::Branch(rebuilt)
            })
        }
        ParseNode::Error(error) => {
            let header = header_at(&error.header, *offset);
            *offset += TextSize::of(error.text.as_str());
            let value = error
                .value
                .as_deref()
                .and_then(|value| rebuild(value, fills, offset, ids));
            Some(ParseNode::Error(ErrorNode::new(
                header,
                (*error.error).clone(),
                error.text.clone(),
                value,
            )))
        }
    }
}

fn header_at(header: &NodeHeader, offset: TextSize) -> NodeHeader {
    NodeHeader {
        start: offset,
        provisional: None,
        generated: false,
        read_ahead: None,
        ..header.clone()
    }
}

fn style_of<'a>(grammar: &'a Grammar, node: &ParseNode) -> Option<(Option<&'a str>, Option<&'a str>)> {
    let rule = grammar.rule(node.rule()?)?;
    Some((rule.style(), rule.name()))
}

fn emit_styled(node: &ParseNode, grammar: &Grammar, fills: &mut VecDeque<CompactString>, sink: &mut dyn StyleSink) {
    match node {
        ParseNode::Format(_) => {
            if let Some(fill) = fills.pop_front()
                && !fill.is_empty()
            {
                sink.style_string(&fill, false, None, None);
            }
        }
        ParseNode::Leaf(leaf) => {
            if leaf.text.is_empty() {
                return;
            }
            let (style, description) = style_of(grammar, node).unwrap_or_default();
            sink.style_string(leaf.text.as_str(), true, style, description);
        }
        ParseNode::Branch(branch) | ParseNode::Partial(branch) => {
            let style = node
                .rule()
                .and_then(|rule| grammar.rule(rule))
                .and_then(Parselet::style);
            if let Some(style) = style {
                sink.style_start(style);
            }
            for child in branch.children.iter().flatten() {
                emit_styled(child, grammar, fills, sink);
            }
            if let Some(style) = style {
                sink.style_end(style);
            }
        }
        ParseNode::Error(error) => {
            sink.style_start("error");
            if !error.text.is_empty() {
                let message = error.error.to_string();
                sink.style_string(error.text.as_str(), true, Some("error"), Some(&message));
            }
            if let Some(value) = error.value.as_deref() {
                emit_styled(value, grammar, fills, sink);
            }
            sink.style_end("error");
        }
    }
}
