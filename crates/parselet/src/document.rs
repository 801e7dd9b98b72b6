//! # Documents
//!
//! A [`Document`] keeps one text together with everything derived from it:
//! the parse tree, the root semantic value, the value arena, the node id
//! allocator and the errors recovered while parsing.
//!
//! Edits flow in two directions. [`Document::edit`] takes new text and
//! brings the tree and values up to date incrementally.
//! [`Document::regenerate`] takes the (possibly edited) values and brings
//! the text up to date, keeping the formatting of everything that did not
//! change.
//!
//! ```rust
//! use parselet::document::Document;
//! use parselet::format::FormatPolicy;
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
//! let mut doc = Document::parse(&grammar, "a;   b;").unwrap();
//! let list = doc.value().unwrap();
//! let first = doc.values().elements(list).unwrap()[0];
//! let name = doc.values().field(first, "name").unwrap();
//! doc.values_mut().set_text(name, "z").unwrap();
//!
//! assert_eq!(doc.regenerate(&FormatPolicy::default()).unwrap(), "z;   b;");
//! ```

use crate::error::{DiffError, GenerateError, ParseError};
use crate::format::{FormatPolicy, Formatter};
use crate::generate::Generator;
use crate::grammar::Grammar;
use crate::incremental::{IncrementalParser, ReparseReport, TextEdit, collect_errors};
use crate::parser::{ParseConfig, Parser};
use crate::tree::{NodeIds, ParseNode};
use crate::value::{SemanticTree, ValueId};
use std::sync::Arc;

/// A parsed text and its semantic model.
#[derive(Debug, Clone)]
pub struct Document<'g> {
    pub(crate) grammar: &'g Grammar,
    pub(crate) config: ParseConfig,
    pub(crate) source: Arc<str>,
    pub(crate) root: ParseNode,
    pub(crate) value: Option<ValueId>,
    pub(crate) values: SemanticTree,
    pub(crate) ids: NodeIds,
    pub(crate) errors: Vec<ParseError>,
}

impl<'g> Document<'g> {
    /// Parse `text` with the grammar's entry rule.
    pub fn parse(grammar: &'g Grammar, text: &str) -> Result<Self, ParseError> {
        Self::parse_with_config(grammar, text, ParseConfig::default())
    }

    pub fn parse_with_config(grammar: &'g Grammar, text: &str, config: ParseConfig) -> Result<Self, ParseError> {
        let source: Arc<str> = Arc::from(text);
        let mut values = SemanticTree::new();
        let mut ids = NodeIds::new();
        let parsed = Parser::new(grammar)
            .with_config(config.clone())
            .parse_shared(source.clone(), &mut values, &mut ids)?;
        let mut doc = Self {
            grammar,
            config,
            source,
            root: parsed.root,
            value: parsed.value,
            values,
            ids,
            errors: parsed.errors,
        };
        doc.reclaim_values();
        Ok(doc)
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn root(&self) -> &ParseNode {
        &self.root
    }

    /// The root semantic value, if the entry rule produced one.
    #[must_use]
    pub const fn value(&self) -> Option<ValueId> {
        self.value
    }

    #[must_use]
    pub const fn values(&self) -> &SemanticTree {
        &self.values
    }

    /// Mutable access to the semantic model. Edits made here show up in the
    /// text after [`regenerate`](Self::regenerate).
    pub fn values_mut(&mut self) -> &mut SemanticTree {
        &mut self.values
    }

    /// Errors recovered into error nodes of the current tree.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    #[must_use]
    pub const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Replace the whole text, reparsing only what changed.
    ///
    /// Parsed values the edit leaves unreachable from the document are
    /// released, and their ids may be reused. Values created through
    /// [`values_mut`](Self::values_mut) are never released.
    pub fn edit(&mut self, new_text: &str) -> Result<ReparseReport, DiffError> {
        IncrementalParser::new(self.grammar)
            .with_config(self.config.clone())
            .reparse(self, new_text)
    }

    /// Apply one range edit to the current text.
    pub fn apply_edit(&mut self, edit: &TextEdit) -> Result<ReparseReport, DiffError> {
        let Some(new_text) = edit.apply(&self.source) else {
            return Err(DiffError::EditOutOfBounds { range: edit.range });
        };
        self.edit(&new_text)
    }

    /// Release parsed values that neither the root value, a node of the
    /// tree nor a recovered error refers to.
    pub(crate) fn reclaim_values(&mut self) {
        let mut roots: Vec<ValueId> = self.value.into_iter().collect();
        roots.extend(self.root.walk().filter_map(ParseNode::value));
        roots.extend(self.errors.iter().filter_map(ParseError::partial));
        self.values.reclaim_unreachable(roots);
    }

    /// Rewrite the text from the semantic model.
    ///
    /// Subtrees whose values are unchanged keep their original text and
    /// whitespace; everything else is generated and laid out with `policy`.
    /// On error the document is left as it was.
    pub fn regenerate(&mut self, policy: &FormatPolicy) -> Result<&str, GenerateError> {
        let entry = self.grammar.entry();
        let Some(value) = self.value else {
            return Err(GenerateError::NoValue { rule: entry, slot: None });
        };
        let generated = Generator::new(self.grammar).restore(
            &mut self.values,
            value,
            entry,
            &self.root,
            &mut self.ids,
        )?;
        let resolved = Formatter::new(policy, &self.values).resolve(&generated.root, &mut self.ids);
        tracing::debug!(
            reused = generated.metrics.reused_subtrees,
            attempts = generated.metrics.attempts,
            "regenerated document"
        );
        self.source = Arc::from(resolved.text());
        self.errors = collect_errors(&resolved);
        self.root = resolved;
        Ok(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{CharSet, GrammarBuilder, Parselet, Slot};
    use crate::text::{TextRange, range_of, size_of};

    fn statements() -> Grammar {
        let mut g = GrammarBuilder::new();
        let word = g.add(Parselet::char_class(CharSet::identifier()).repeat());
        let semi = g.literal(";");
        let space = g.space();
        let stmt = g.sequence(
            "Stmt",
            [Slot::syntax(space), Slot::property("name", word), Slot::syntax(semi)],
        );
        let stmts = g.add(Parselet::reference(stmt).repeat().optional());
        g.entry(stmts);
        g.build().unwrap()
    }

    fn names(doc: &Document<'_>) -> Vec<String> {
        let list = doc.value().unwrap();
        doc.values()
            .elements(list)
            .unwrap()
            .iter()
            .map(|&stmt| doc.values().render(doc.values().field(stmt, "name").unwrap()))
            .collect()
    }

    #[test]
    fn regenerate_keeps_untouched_formatting() {
        let grammar = statements();
        let mut doc = Document::parse(&grammar, "a;\n  b;  c;").unwrap();
        let list = doc.value().unwrap();
        let second = doc.values().elements(list).unwrap()[1];
        let name = doc.values().field(second, "name").unwrap();
        doc.values_mut().set_text(name, "bee").unwrap();

        let text = doc.regenerate(&FormatPolicy::default()).unwrap().to_owned();
        assert_eq!(text, "a; bee;  c;");
        assert!(!doc.root().is_generated_tree());
        doc.root().check_offsets().unwrap();
        assert_eq!(doc.root().text(), text);
    }

    #[test]
    fn regenerated_text_can_be_edited_again() {
        let grammar = statements();
        let mut doc = Document::parse(&grammar, "a; b;").unwrap();
        let list = doc.value().unwrap();
        let item = doc.values_mut().object("Stmt");
        let name = doc.values_mut().text("c");
        doc.values_mut().set_field(item, "name", Some(name)).unwrap();
        doc.values_mut().push(list, item).unwrap();

        doc.regenerate(&FormatPolicy::default()).unwrap();
        assert!(doc.text().starts_with("a; b;"));
        assert!(doc.text().ends_with("c;"));

        let edited = doc.text().replace('c', "cat");
        doc.edit(&edited).unwrap();
        assert_eq!(doc.text(), edited);
        assert_eq!(names(&doc), ["\"a\"", "\"b\"", "\"cat\""]);
    }

    #[test]
    fn apply_edit_splices_the_range() {
        let grammar = statements();
        let mut doc = Document::parse(&grammar, "a; b;").unwrap();
        doc.apply_edit(&TextEdit::insert(size_of(5), " c;")).unwrap();
        assert_eq!(doc.text(), "a; b; c;");
        assert_eq!(names(&doc), ["\"a\"", "\"b\"", "\"c\""]);
    }

    #[test]
    fn out_of_bounds_edit_is_rejected() {
        let grammar = statements();
        let mut doc = Document::parse(&grammar, "a;").unwrap();
        let range: TextRange = range_of(1, 10);
        assert_eq!(
            doc.apply_edit(&TextEdit::delete(range)).unwrap_err(),
            DiffError::EditOutOfBounds { range }
        );
        assert_eq!(doc.text(), "a;");
    }

    #[test]
    fn regenerate_without_a_value_fails() {
        let mut g = GrammarBuilder::new();
        let semi = g.add(Parselet::literal(";").discard());
        g.entry(semi);
        let grammar = g.build().unwrap();
        let mut doc = Document::parse(&grammar, ";").unwrap();
        assert!(matches!(
            doc.regenerate(&FormatPolicy::default()),
            Err(GenerateError::NoValue { slot: None, .. })
        ));
        assert_eq!(doc.text(), ";");
    }
}
