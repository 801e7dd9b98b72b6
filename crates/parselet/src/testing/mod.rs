//! # Testing Utilities
//!
//! Helpers for writing readable assertions against trees and styled
//! output.
//!
//! - [`dump_tree`] renders a tree as an indented outline, one node per
//!   line, with rule names, ranges and values.
//! - [`RecordingSink`] is a [`StyleSink`] that records every event, for
//!   checking what a styled rendering emitted without going through HTML.
//!
//! ```rust
//! use parselet::grammar::{GrammarBuilder, Parselet, Slot};
//! use parselet::parser::Parser;
//! use parselet::testing::dump_tree;
//! use parselet::tree::NodeIds;
//! use parselet::value::SemanticTree;
//!
//! let mut g = GrammarBuilder::new();
//! let x = g.rule("x", Parselet::literal("x"));
//! let semi = g.literal(";");
//! let stmt = g.rule("stmt", Parselet::sequence("Stmt", [Slot::property("name", x), Slot::syntax(semi)]));
//! g.entry(stmt);
//! let grammar = g.build().unwrap();
//!
//! let parsed = Parser::new(&grammar).parse("x;", &mut SemanticTree::new(), &mut NodeIds::new()).unwrap();
//! let dump = dump_tree(&parsed.root, Some(&grammar));
//! assert!(dump.starts_with("Branch stmt 0..2"));
//! assert!(dump.contains("\n  Leaf x 0..1 \"x\""));
//! ```

use crate::format::StyleSink;
use crate::grammar::Grammar;
use crate::tree::{ParseNode, Placeholder};
use std::fmt::Write;

/// Indented outline of `root`.
///
/// Each line is `<Kind> <rule> <start>..<end>` followed by the leaf text,
/// `=vN` for the attached value (`*` when the node owns it) and `!` for
/// generated nodes. Rules are shown by name when `grammar` is given and
/// the rule has one. Empty slots appear as `-`.
#[must_use]
pub fn dump_tree(root: &ParseNode, grammar: Option<&Grammar>) -> String {
    let mut out = String::new();
    dump_node(Some(root), grammar, 0, &mut out);
    out
}

fn dump_node(node: Option<&ParseNode>, grammar: Option<&Grammar>, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    let Some(node) = node else {
        out.push_str("-\n");
        return;
    };
    let kind = match node {
        ParseNode::Leaf(_) => "Leaf",
        ParseNode::Branch(_) => "Branch",
        ParseNode::Partial(_) => "Partial",
        ParseNode::Error(_) => "Error",
        ParseNode::Format(Placeholder::Space) => "Space",
        ParseNode::Format(Placeholder::Newline) => "Newline",
    };
    out.push_str(kind);
    if let Some(header) = node.header() {
        match header.rule() {
            Some(rule) => {
                let name = grammar.and_then(|g| g.rule(rule)).and_then(|p| p.name());
                match name {
                    Some(name) => {
                        let _ = write!(out, " {name}");
                    }
                    None => {
                        let _ = write!(out, " {rule}");
                    }
                }
            }
            None => out.push_str(" _"),
        }
        let range = node.range();
        let _ = write!(out, " {}..{}", u32::from(range.start()), u32::from(range.end()));
    }
    match node {
        ParseNode::Leaf(leaf) => {
            let _ = write!(out, " {:?}", leaf.token().as_str());
        }
        ParseNode::Error(error) => {
            let _ = write!(out, " {:?} ({})", error.error_text().as_str(), error.error());
        }
        _ => {}
    }
    if let Some(header) = node.header() {
        if let Some(value) = header.value() {
            let owned = if header.owns_value() { "*" } else { "" };
            let _ = write!(out, " ={value}{owned}");
        }
        if header.is_generated() {
            out.push_str(" !");
        }
    }
    out.push('\n');
    match node {
        ParseNode::Error(error) => {
            if let Some(resynced) = error.resynced() {
                dump_node(Some(resynced), grammar, depth + 1, out);
            }
        }
        _ => {
            for slot in node.slots() {
                dump_node(slot.as_ref(), grammar, depth + 1, out);
            }
        }
    }
}

/// One call received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleEvent {
    Start(String),
    End(String),
    Text {
        text: String,
        escape: bool,
        style: Option<String>,
        description: Option<String>,
    },
}

/// A [`StyleSink`] that keeps every event in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<StyleEvent>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All text received, concatenated.
    #[must_use]
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                StyleEvent::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text received with `style` on the string itself.
    #[must_use]
    pub fn styled(&self, style: &str) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                StyleEvent::Text {
                    text,
                    style: Some(found),
                    ..
                } if found == style => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether every `Start` is closed by a matching `End`, innermost first.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        let mut open = Vec::new();
        for event in &self.events {
            match event {
                StyleEvent::Start(style) => open.push(style),
                StyleEvent::End(style) => {
                    if open.pop() != Some(style) {
                        return false;
                    }
                }
                StyleEvent::Text { .. } => {}
            }
        }
        open.is_empty()
    }
}

impl StyleSink for RecordingSink {
    fn style_start(&mut self, style: &str) {
        self.events.push(StyleEvent::Start(style.to_owned()));
    }

    fn style_end(&mut self, style: &str) {
        self.events.push(StyleEvent::End(style.to_owned()));
    }

    fn style_string(&mut self, text: &str, escape: bool, style: Option<&str>, description: Option<&str>) {
        self.events.push(StyleEvent::Text {
            text: text.to_owned(),
            escape,
            style: style.map(str::to_owned),
            description: description.map(str::to_owned),
        });
    }
}
