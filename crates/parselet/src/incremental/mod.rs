//! # Incremental Reparsing
//!
//! Re-parse only the part of a document an edit touched.
//!
//! ## Overview
//!
//! [`DiffContext::compute`] compares the old tree's text with the new text
//! and finds the changed interval. [`IncrementalParser::reparse`] then
//! tries the nodes covering that interval from the innermost outward:
//!
//! 1. a node is only a candidate if the parse around it had not already
//!    looked into the edited text before reaching it
//! 2. the node's rule is matched again on the new text, at the node's
//!    old start
//! 3. the match must end exactly where the node's old end lands after the
//!    edit, otherwise the edit changed how the surroundings parse and the
//!    next node out is tried
//! 4. the new subtree replaces the old one, offsets are re-threaded and
//!    checked against the offsets the match observed
//! 5. the node's old semantic value is overwritten in place, so objects
//!    referring to it see the new content
//!
//! When no candidate fits, the whole document is parsed again. Either way,
//! parsed values that are no longer reachable from the document are
//! released afterwards.
//!
//! ## Usage
//!
//! ```rust
//! use parselet::document::Document;
//! use parselet::grammar::{CharSet, GrammarBuilder, Parselet, Slot};
//!
//! let mut g = GrammarBuilder::new();
//! let word = g.add(Parselet::char_class(CharSet::identifier()).repeat());
//! let semi = g.literal(";");
//! let space = g.space();
//! let stmt = g.sequence("Stmt", [Slot::syntax(space), Slot::property("name", word), Slot::syntax(semi)]);
//! let stmts = g.add(Parselet::reference(stmt).repeat().optional());
//! g.entry(stmts);
//! let grammar = g.build().unwrap();
//!
//! let mut doc = Document::parse(&grammar, "a; b; c;").unwrap();
//! let report = doc.edit("a; bee; c;").unwrap();
//! assert!(!report.full_reparse);
//! assert_eq!(doc.text(), "a; bee; c;");
//! ```

mod diff;

pub use diff::DiffContext;

use crate::document::Document;
use crate::error::{DiffError, ParseError};
use crate::grammar::Grammar;
use crate::parser::{ParseConfig, Parser};
use crate::text::{TextRange, TextSize, range_of};
use crate::tree::{NodeHeader, NodeId, ParseNode};
use crate::value::ValueId;
use std::sync::Arc;

/// A replacement of one range of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TextEdit {
    pub range: TextRange,
    pub new_text: String,
}

impl TextEdit {
    #[must_use]
    pub fn new(range: TextRange, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }

    #[must_use]
    pub fn insert(offset: TextSize, text: impl Into<String>) -> Self {
        Self::new(TextRange::empty(offset), text)
    }

    #[must_use]
    pub fn delete(range: TextRange) -> Self {
        Self::new(range, String::new())
    }

    /// `text` with the edit applied, or `None` if the range is out of
    /// bounds or splits a character.
    #[must_use]
    pub fn apply(&self, text: &str) -> Option<String> {
        let start = u32::from(self.range.start()) as usize;
        let end = u32::from(self.range.end()) as usize;
        let head = text.get(..start)?;
        let tail = text.get(end..)?;
        let mut out = String::with_capacity(head.len() + self.new_text.len() + tail.len());
        out.push_str(head);
        out.push_str(&self.new_text);
        out.push_str(tail);
        Some(out)
    }
}

/// What a reparse did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparseReport {
    /// Range of the new text that was matched again
    pub reparsed: TextRange,
    /// Old nodes carried over unchanged
    pub reused_nodes: usize,
    pub full_reparse: bool,
}

/// Re-parses documents after text edits.
#[derive(Debug, Clone)]
pub struct IncrementalParser<'g> {
    parser: Parser<'g>,
}

/// A subtree that matched the new text and fits where the old one was.
struct Replacement {
    path: Vec<usize>,
    node: ParseNode,
    old_value: Option<ValueId>,
    new_value: Option<ValueId>,
    /// End of the new text the match looked at
    examined: TextSize,
    root: ParseNode,
}

impl<'g> IncrementalParser<'g> {
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            parser: Parser::new(grammar),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ParseConfig) -> Self {
        self.parser = self.parser.with_config(config);
        self
    }

    /// Bring `doc` up to date with `new_text`.
    ///
    /// On error the document is left as it was.
    pub fn reparse(&self, doc: &mut Document<'_>, new_text: &str) -> Result<ReparseReport, DiffError> {
        let diff = DiffContext::compute(&doc.root, new_text)?;
        if diff.is_unchanged() {
            return Ok(ReparseReport {
                reparsed: TextRange::empty(TextSize::default()),
                reused_nodes: count_nodes(&doc.root),
                full_reparse: false,
            });
        }
        tracing::debug!(
            old = ?diff.old_range(),
            new = ?diff.new_range(),
            delta = diff.delta(),
            changed = diff.changed_len(),
            "reparsing edited document"
        );

        let source: Arc<str> = Arc::from(new_text);
        for path in candidates(&doc.root, diff.old_range()) {
            let Some(replacement) = self.try_subtree(doc, &diff, &source, path) else {
                continue;
            };
            return self.commit(doc, source, replacement);
        }

        tracing::debug!("no subtree fits the edit, falling back to a full parse");
        let parsed = self.parser.parse_shared(source.clone(), &mut doc.values, &mut doc.ids)?;
        doc.source = source;
        doc.root = parsed.root;
        doc.value = parsed.value;
        doc.errors = parsed.errors;
        doc.reclaim_values();
        Ok(ReparseReport {
            reparsed: range_of(0, new_text.len()),
            reused_nodes: 0,
            full_reparse: true,
        })
    }

    fn try_subtree(
        &self,
        doc: &mut Document<'_>,
        diff: &DiffContext,
        source: &Arc<str>,
        path: Vec<usize>,
    ) -> Option<Replacement> {
        let old = doc.root.node_at_path(&path)?;
        let rule = old.rule()?;
        if matches!(old, ParseNode::Error(_) | ParseNode::Partial(_)) {
            return None;
        }
        let old_value = old.value();
        let start = old.start();
        let read_ahead = old.header().and_then(NodeHeader::read_ahead)?;
        let lead = start + read_ahead;
        if lead > diff.old_range().start() {
            tracing::debug!(
                rule = %rule,
                lead = u32::from(lead),
                "input around the candidate was read past the edit"
            );
            return None;
        }
        let expected_end = diff.shift(old.end());
        let matched = self
            .parser
            .match_after(rule, source, start, lead, &mut doc.values, &mut doc.ids);
        let matched = match matched {
            Ok(matched) => matched,
            Err(error) => {
                tracing::debug!(rule = %rule, %error, "candidate no longer matches");
                return None;
            }
        };
        if matched.end != expected_end {
            tracing::debug!(
                rule = %rule,
                end = u32::from(matched.end),
                expected = u32::from(expected_end),
                "candidate match ends elsewhere"
            );
            return None;
        }
        if old_value.is_some() != matched.value.is_some() {
            return None;
        }
        let Some(mut node) = matched.node else {
            return None;
        };

        // The offsets the match observed must survive re-threading.
        node.for_each_header(&mut |header| header.provisional = Some(header.start));
        let mut root = doc.root.clone();
        root.replace_at_path(&path, node.clone())?;
        if let Err(error) = root.reset_start_index(TextSize::default(), true, false) {
            tracing::debug!(rule = %rule, %error, "candidate offsets disagree after the edit");
            return None;
        }
        root.clear_provisional();
        node.clear_provisional();
        tracing::debug!(rule = %rule, start = u32::from(start), depth = path.len(), "reparsed subtree");
        Some(Replacement {
            path,
            node,
            old_value,
            new_value: matched.value,
            examined: matched.examined,
            root,
        })
    }

    fn commit(
        &self,
        doc: &mut Document<'_>,
        source: Arc<str>,
        replacement: Replacement,
    ) -> Result<ReparseReport, DiffError> {
        let Replacement {
            path,
            node,
            old_value,
            new_value,
            examined,
            mut root,
        } = replacement;
        if let (Some(old), Some(new)) = (old_value, new_value) {
            doc.values.replace_in_place(old, new)?;
            if let Some(subtree) = root.node_at_path_mut(&path) {
                subtree.for_each_header(&mut |header| {
                    if header.value == Some(new) {
                        header.value = Some(old);
                    }
                });
            }
        }
        let mut owners: Vec<(ValueId, NodeId)> = Vec::new();
        if let Some(subtree) = root.node_at_path_mut(&path) {
            subtree.for_each_header(&mut |header| {
                if header.owns_value
                    && let Some(value) = header.value
                {
                    owners.push((value, header.id));
                }
            });
        }
        for (value, owner) in owners {
            doc.values.set_owner(value, Some(owner));
        }

        let reparsed = node.range();
        // Nodes after the new subtree were reached with at least this much
        // of the input looked at.
        root.for_each_header(&mut |header| {
            if header.start >= reparsed.end()
                && header.start < examined
                && let Some(read_ahead) = header.read_ahead
            {
                header.read_ahead = Some(read_ahead.max(examined - header.start));
            }
        });
        let reused_nodes = count_nodes(&root).saturating_sub(count_nodes(&node));
        doc.errors = collect_errors(&root);
        doc.root = root;
        doc.source = source;
        doc.reclaim_values();
        Ok(ReparseReport {
            reparsed,
            reused_nodes,
            full_reparse: false,
        })
    }
}

/// Slot paths of the nodes covering `interval`, innermost first.
fn candidates(root: &ParseNode, interval: TextRange) -> Vec<Vec<usize>> {
    let mut paths = vec![Vec::new()];
    let mut node = root;
    let mut path = Vec::new();
    'descend: loop {
        for (index, child) in node.slots().iter().enumerate() {
            let Some(child) = child else {
                continue;
            };
            if child.is_placeholder() {
                continue;
            }
            let range = child.range();
            if range.start() <= interval.start() && interval.end() <= range.end() {
                path.push(index);
                paths.push(path.clone());
                node = child;
                continue 'descend;
            }
        }
        break;
    }
    paths.reverse();
    paths
}

fn count_nodes(root: &ParseNode) -> usize {
    root.walk().filter(|node| !node.is_placeholder()).count()
}

pub(crate) fn collect_errors(root: &ParseNode) -> Vec<ParseError> {
    root.walk()
        .filter_map(ParseNode::as_error)
        .map(|error| error.error().clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{CharSet, GrammarBuilder, Parselet, RuleId, Slot};
    use crate::text::size_of;
    use crate::value::SemanticTree;

    fn statements() -> (Grammar, RuleId) {
        let mut g = GrammarBuilder::new();
        let word = g.add(Parselet::char_class(CharSet::identifier()).repeat());
        let semi = g.literal(";");
        let space = g.space();
        let stmt = g.rule(
            "stmt",
            Parselet::sequence("Stmt", [Slot::syntax(space), Slot::property("name", word), Slot::syntax(semi)]),
        );
        let stmts = g.add(Parselet::reference(stmt).repeat().optional());
        g.entry(stmts);
        (g.build().unwrap(), stmt)
    }

    fn names(values: &SemanticTree, list: ValueId) -> Vec<String> {
        values
            .elements(list)
            .unwrap()
            .iter()
            .map(|stmt| values.render(values.field(*stmt, "name").unwrap()))
            .collect()
    }

    #[test]
    fn edits_inside_a_token_reparse_only_that_token() {
        let (grammar, _) = statements();
        let mut doc = Document::parse(&grammar, "a; b; c;").unwrap();
        let list = doc.value().unwrap();
        let second = doc.values().elements(list).unwrap()[1];

        let report = doc.edit("a; bee; c;").unwrap();
        assert!(!report.full_reparse);
        assert_eq!(report.reparsed, range_of(3, 6));
        assert!(report.reused_nodes > 0);
        assert_eq!(doc.text(), "a; bee; c;");
        assert_eq!(doc.root().text(), "a; bee; c;");
        doc.root().check_offsets().unwrap();

        assert_eq!(doc.value(), Some(list));
        assert_eq!(names(doc.values(), list), ["\"a\"", "\"bee\"", "\"c\""]);
        assert_eq!(doc.values().elements(list).unwrap()[1], second);
    }

    #[test]
    fn structural_edits_move_outward() {
        let (grammar, _) = statements();
        let mut doc = Document::parse(&grammar, "a; b;").unwrap();
        let report = doc.edit("a; x; b;").unwrap();
        assert_eq!(doc.root().text(), "a; x; b;");
        assert_eq!(names(doc.values(), doc.value().unwrap()), ["\"a\"", "\"x\"", "\"b\""]);
        doc.root().check_offsets().unwrap();
        assert!(report.reparsed.len() >= TextSize::from(3));
    }

    #[test]
    fn unparsable_edits_leave_the_document_alone() {
        let (grammar, _) = statements();
        let mut doc = Document::parse(&grammar, "a; b;").unwrap();
        let error = doc.edit("a; b").unwrap_err();
        assert!(matches!(error, DiffError::Parse(_)));
        assert_eq!(doc.text(), "a; b;");
    }

    #[test]
    fn nodes_whose_context_read_the_edit_are_not_reused() {
        let mut g = GrammarBuilder::new();
        let word = g.add(Parselet::char_class(CharSet::identifier()).repeat());
        let not_if = g.add(Parselet::literal_with(crate::grammar::Literal::keyword("if")).lookahead().negate());
        let semi = g.literal(";");
        let name = g.sequence("Name", [Slot::syntax(not_if), Slot::property("id", word), Slot::syntax(semi)]);
        g.entry(name);
        let grammar = g.build().unwrap();

        let mut doc = Document::parse(&grammar, "ix;").unwrap();
        let word_node = doc.root().slots()[1].as_ref().unwrap();
        assert_eq!(word_node.header().and_then(NodeHeader::read_ahead), Some(size_of(2)));
        assert!(matches!(doc.edit("if;"), Err(DiffError::Parse(_))));
        assert_eq!(doc.text(), "ix;");

        let report = doc.edit("iz;").unwrap();
        assert_eq!(report.reparsed, range_of(0, 3));
        assert_eq!(doc.values().render(doc.value().unwrap()), "Name { id: \"iz\" }");

        let report = doc.edit("izzy;").unwrap();
        assert!(!report.full_reparse);
        assert_eq!(report.reparsed, range_of(0, 4));
        assert_eq!(doc.values().render(doc.value().unwrap()), "Name { id: \"izzy\" }");
    }

    #[test]
    fn unchanged_text_reuses_everything() {
        let (grammar, _) = statements();
        let mut doc = Document::parse(&grammar, "a;").unwrap();
        let report = doc.edit("a;").unwrap();
        assert!(!report.full_reparse);
        assert_eq!(report.reused_nodes, count_nodes(doc.root()));
    }

    #[test]
    fn text_edits_apply_to_byte_ranges() {
        let edit = TextEdit::new(range_of(3, 4), "bee");
        assert_eq!(edit.apply("a; b; c;").as_deref(), Some("a; bee; c;"));
        assert_eq!(TextEdit::insert(size_of(0), "z;").apply("a;").as_deref(), Some("z;a;"));
        assert_eq!(TextEdit::delete(range_of(0, 9)).apply("a;"), None);
        assert_eq!(TextEdit::delete(range_of(1, 2)).apply("é"), None);
    }
}
