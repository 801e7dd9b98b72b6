//! # Parser
//!
//! Recursive-descent matching of a [`Grammar`] over source text, producing
//! a [`ParseNode`] tree and semantic values in a [`SemanticTree`].
//!
//! ## Overview
//!
//! Matching is ordered-choice (first alternative that succeeds wins) with
//! unlimited backtracking. Literal text in the tree is never copied: every
//! leaf is a view into the shared source buffer.
//!
//! Failures are ordinary control flow. A failure that reaches a sequence
//! flagged [`SKIP_ON_ERROR`](crate::grammar::RuleFlags::SKIP_ON_ERROR) is
//! recovered into an error node; one that reaches the top is returned as a
//! [`ParseError`] carrying the best partial value.
//!
//! ## Budgets
//!
//! There is no cancellation. [`ParseConfig::max_steps`] bounds the number of
//! rule entries and [`ParseConfig::max_depth`] the nesting; exhausting
//! either aborts the whole parse with [`ParseError::Budget`].
//!
//! ```rust
//! use parselet::grammar::{CharSet, GrammarBuilder, Parselet, Slot};
//! use parselet::parser::Parser;
//! use parselet::tree::NodeIds;
//! use parselet::value::SemanticTree;
//!
//! let mut g = GrammarBuilder::new();
//! let word = g.add(Parselet::char_class(CharSet::identifier()).repeat());
//! let semi = g.literal(";");
//! let stmt = g.rule("stmt", Parselet::sequence("Stmt", [Slot::property("name", word), Slot::syntax(semi)]));
//! g.entry(stmt);
//! let grammar = g.build().unwrap();
//!
//! let mut values = SemanticTree::new();
//! let mut ids = NodeIds::new();
//! let parsed = Parser::new(&grammar).parse("x;", &mut values, &mut ids).unwrap();
//! assert_eq!(parsed.root.text(), "x;");
//! assert_eq!(values.render(parsed.value.unwrap()), "Stmt { name: \"x\" }");
//! ```

mod engine;
mod recovery;

use crate::error::{BudgetKind, ParseError, ParseMetrics};
use crate::grammar::{Grammar, RuleId};
use crate::text::{TextSize, range_of, size_of};
use crate::tree::{NodeIds, ParseNode};
use crate::value::{SemanticTree, ValueId};
use engine::MatchContext;
use std::sync::Arc;
use std::time::Instant;

/// Limits and switches for one parse.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseConfig {
    /// Maximum number of rule entries; `None` is unbounded
    pub max_steps: Option<usize>,
    /// Maximum rule nesting
    pub max_depth: usize,
    /// Honour `SKIP_ON_ERROR`; when off, every failure propagates
    pub error_recovery: bool,
    /// Recovered errors allowed before recovery stops
    pub max_errors: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            max_depth: 512,
            error_recovery: true,
            max_errors: 100,
        }
    }
}

/// A successful parse, possibly with recovered errors embedded in the tree.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub root: ParseNode,
    pub value: Option<ValueId>,
    /// Errors recovered into error nodes, in the order they were found
    pub errors: Vec<ParseError>,
    pub metrics: ParseMetrics,
}

impl Parsed {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of matching one rule at an offset, without requiring the rest of
/// the input to be consumed.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub node: Option<ParseNode>,
    pub value: Option<ValueId>,
    pub end: TextSize,
    /// End of the input the match looked at, possibly one past the end of
    /// the source.
    pub examined: TextSize,
    pub errors: Vec<ParseError>,
    pub metrics: ParseMetrics,
}

/// Parses text with a grammar. Cheap to create; holds no per-parse state.
#[derive(Debug, Clone)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    config: ParseConfig,
}

impl<'g> Parser<'g> {
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            config: ParseConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ParseConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    #[must_use]
    pub const fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Parse `source` with the grammar's entry rule.
    pub fn parse(
        &self,
        source: &str,
        values: &mut SemanticTree,
        ids: &mut NodeIds,
    ) -> Result<Parsed, ParseError> {
        self.parse_shared(Arc::from(source), values, ids)
    }

    /// Parse a buffer the caller already shares; leaves become views of it.
    pub fn parse_shared(
        &self,
        source: Arc<str>,
        values: &mut SemanticTree,
        ids: &mut NodeIds,
    ) -> Result<Parsed, ParseError> {
        self.parse_rule(self.grammar.entry(), source, values, ids)
    }

    /// Parse all of `source` with `rule`.
    pub fn parse_rule(
        &self,
        rule: RuleId,
        source: Arc<str>,
        values: &mut SemanticTree,
        ids: &mut NodeIds,
    ) -> Result<Parsed, ParseError> {
        let started = Instant::now();
        check_rule(self.grammar, rule)?;
        check_len(source.len())?;
        let mut ctx = MatchContext::new(self.grammar, &self.config, &source, values, ids);
        let matched = match ctx.match_rule(rule, 0, true) {
            Ok(matched) => matched,
            Err(error) => return Err(ctx.top_level_error(error)),
        };
        if matched.end < source.len() {
            return Err(ctx.trailing_input(matched.end, matched.value));
        }
        let root = match matched.node {
            Some(node) => node,
            None => ParseNode::branch(ctx.header(0, Some(rule)), Vec::new()),
        };
        let (errors, mut metrics) = ctx.finish();
        metrics.parse_time = started.elapsed();
        tracing::trace!(
            rule = %rule,
            steps = metrics.steps,
            nodes = metrics.nodes_created,
            recovered = errors.len(),
            "parse finished"
        );
        Ok(Parsed {
            root,
            value: matched.value,
            errors,
            metrics,
        })
    }

    /// Match `rule` at `offset` and stop wherever the rule stops. Used by
    /// incremental reparsing to re-run one subtree's rule on new text.
    pub fn match_at(
        &self,
        rule: RuleId,
        source: &Arc<str>,
        offset: TextSize,
        values: &mut SemanticTree,
        ids: &mut NodeIds,
    ) -> Result<RuleMatch, ParseError> {
        self.match_after(rule, source, offset, offset, values, ids)
    }

    /// Like [`match_at`](Self::match_at), for a match whose surrounding
    /// parse had already looked at the input up to `examined`. The nodes
    /// produced record that context.
    pub fn match_after(
        &self,
        rule: RuleId,
        source: &Arc<str>,
        offset: TextSize,
        examined: TextSize,
        values: &mut SemanticTree,
        ids: &mut NodeIds,
    ) -> Result<RuleMatch, ParseError> {
        let started = Instant::now();
        check_rule(self.grammar, rule)?;
        check_len(source.len())?;
        let mut ctx = MatchContext::new(self.grammar, &self.config, source, values, ids)
            .reading_from(u32::from(examined) as usize);
        let matched = ctx
            .match_rule(rule, u32::from(offset) as usize, true)
            .map_err(|error| ctx.top_level_error(error))?;
        let examined = size_of(ctx.examined());
        let (errors, mut metrics) = ctx.finish();
        metrics.parse_time = started.elapsed();
        Ok(RuleMatch {
            node: matched.node,
            value: matched.value,
            end: size_of(matched.end),
            examined,
            errors,
            metrics,
        })
    }
}

fn check_rule(grammar: &Grammar, rule: RuleId) -> Result<(), ParseError> {
    if grammar.rule(rule).is_some() {
        return Ok(());
    }
    tracing::error!(rule = %rule, "rule is not part of the grammar");
    Err(ParseError::expected(range_of(0, 0), rule.to_string(), false, None))
}

/// Offsets are 32-bit; longer buffers cannot be parsed.
fn check_len(len: usize) -> Result<(), ParseError> {
    if u32::try_from(len).is_ok() {
        return Ok(());
    }
    tracing::error!(len, "input is too large to parse");
    Err(ParseError::Budget {
        span: range_of(0, 0),
        kind: BudgetKind::Input,
        partial: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::grammar::{CharSet, GrammarBuilder, IndexedChoice, Literal, Parselet, RuleFlags, Slot};

    fn parse(grammar: &Grammar, source: &str) -> (Result<Parsed, ParseError>, SemanticTree) {
        let mut values = SemanticTree::new();
        let mut ids = NodeIds::new();
        let result = Parser::new(grammar).parse(source, &mut values, &mut ids);
        (result, values)
    }

    fn single(parselet: Parselet) -> Grammar {
        let mut g = GrammarBuilder::new();
        let rule = g.add(parselet);
        g.entry(rule);
        g.build().unwrap()
    }

    #[test]
    fn repeated_literals_are_maximal_and_merged() {
        let mut g = GrammarBuilder::new();
        let a = g.add(Parselet::literal("a").repeat());
        let b = g.literal("b");
        let seq = g.add(Parselet::group([Slot::pass(a), Slot::syntax(b)]));
        g.entry(seq);
        let grammar = g.build().unwrap();
        let (parsed, values) = parse(&grammar, "aaab");
        let parsed = parsed.unwrap();
        let run = parsed.root.slots()[0].as_ref().unwrap();
        assert_eq!(run.as_leaf().unwrap().token(), "aaa");
        assert_eq!(run.len(), TextSize::from(3));
        assert_eq!(values.as_text(parsed.value.unwrap()).unwrap(), "aaa");
    }

    #[test]
    fn leaves_are_views_of_the_source() {
        let grammar = single(Parselet::char_class(CharSet::identifier()).repeat());
        let source: Arc<str> = Arc::from("hello");
        let mut values = SemanticTree::new();
        let mut ids = NodeIds::new();
        let parsed = Parser::new(&grammar)
            .parse_shared(source.clone(), &mut values, &mut ids)
            .unwrap();
        assert!(parsed.root.as_leaf().unwrap().token().is_view_of(&source));
    }

    #[test]
    fn optional_miss_produces_nothing() {
        let mut g = GrammarBuilder::new();
        let x = g.literal("x");
        let maybe = g.add(Parselet::literal("?").optional());
        let seq = g.add(Parselet::sequence("Q", [Slot::property("name", x), Slot::property("mark", maybe)]));
        g.entry(seq);
        let grammar = g.build().unwrap();
        let (parsed, values) = parse(&grammar, "x");
        let parsed = parsed.unwrap();
        assert_eq!(parsed.root.slots()[1], None);
        assert_eq!(values.render(parsed.value.unwrap()), "Q { name: \"x\" }");
    }

    #[test]
    fn negated_literal_runs_up_to_the_terminator() {
        let mut g = GrammarBuilder::new();
        let open = g.literal("/*");
        let body = g.add(Parselet::literal("*/").negate().repeat().optional());
        let close = g.literal("*/");
        let comment = g.add(Parselet::sequence("Comment", [Slot::syntax(open), Slot::property("body", body), Slot::syntax(close)]));
        g.entry(comment);
        let grammar = g.build().unwrap();
        let (parsed, values) = parse(&grammar, "/* a * b */");
        assert_eq!(
            values.render(parsed.unwrap().value.unwrap()),
            "Comment { body: \" a * b \" }"
        );
    }

    #[test]
    fn lookahead_consumes_nothing() {
        let mut g = GrammarBuilder::new();
        let peek = g.add(Parselet::literal("a").lookahead());
        let not_b = g.add(Parselet::literal("b").lookahead().negate());
        let a = g.literal("a");
        let seq = g.add(Parselet::group([Slot::syntax(peek), Slot::syntax(not_b), Slot::pass(a)]));
        g.entry(seq);
        let grammar = g.build().unwrap();
        let (parsed, _) = parse(&grammar, "a");
        assert_eq!(parsed.unwrap().root.text(), "a");
        let (failed, _) = parse(&grammar, "b");
        assert!(failed.is_err());
    }

    #[test]
    fn skip_keeps_whitespace_as_a_valueless_leaf() {
        let grammar = single(Parselet::char_class(CharSet::digits()).repeat().skip_whitespace());
        let (parsed, values) = parse(&grammar, "  42");
        let parsed = parsed.unwrap();
        assert_eq!(parsed.root.text(), "  42");
        let ws = parsed.root.slots()[0].as_ref().unwrap();
        assert_eq!(ws.value(), None);
        assert_eq!(values.as_text(parsed.value.unwrap()).unwrap(), "42");
    }

    #[test]
    fn discard_keeps_the_node_and_drops_the_value() {
        let grammar = single(Parselet::literal("x").discard());
        let (parsed, values) = parse(&grammar, "x");
        let parsed = parsed.unwrap();
        assert_eq!(parsed.root.text(), "x");
        assert_eq!(parsed.value, None);
        assert!(values.is_empty());
    }

    #[test]
    fn exclusions_and_case_folding() {
        let grammar = single(Parselet::literal_with(Literal::text("%").excluding("%>")));
        assert!(parse(&grammar, "%").0.is_ok());
        assert!(parse(&grammar, "%>").0.is_err());
        let grammar = single(Parselet::literal_with(Literal::text("select").ignore_case()));
        assert!(parse(&grammar, "SeLeCt").0.is_ok());
    }

    #[test]
    fn choice_failures_at_the_same_position_aggregate() {
        let mut g = GrammarBuilder::new();
        let a = g.literal("a");
        let b = g.literal("b");
        let hidden = g.add(Parselet::literal("c").no_error());
        let choice = g.add(Parselet::choice([a, b, hidden]));
        g.entry(choice);
        let grammar = g.build().unwrap();
        let error = parse(&grammar, "z").0.unwrap_err();
        assert_eq!(error.code(), ErrorCode::Multiple);
        assert_eq!(error.expected_list(), vec!["\"a\"", "\"b\""]);
    }

    #[test]
    fn furthest_failure_wins() {
        let mut g = GrammarBuilder::new();
        let a = g.literal("a");
        let b = g.literal("b");
        let c = g.literal("c");
        let ab = g.add(Parselet::group([Slot::syntax(a), Slot::syntax(b)]));
        let choice = g.add(Parselet::choice([ab, c]));
        g.entry(choice);
        let grammar = g.build().unwrap();
        let error = parse(&grammar, "ax").0.unwrap_err();
        assert_eq!(error.position(), TextSize::from(1));
        assert_eq!(error.expected_list(), vec!["\"b\""]);
    }

    #[test]
    fn indexed_choice_matches_registered_keys() {
        let mut g = GrammarBuilder::new();
        let kw_if = g.keyword("if");
        let kw_in = g.keyword("in");
        let ident = g.add(Parselet::char_class(CharSet::identifier()).repeat());
        let choice = g.indexed(IndexedChoice::new().with("if", kw_if).with("in", kw_in).with_default(ident));
        g.entry(choice);
        let grammar = g.build().unwrap();
        let (parsed, _) = parse(&grammar, "in");
        assert_eq!(parsed.unwrap().root.rule(), Some(choice));
        let (parsed, values) = parse(&grammar, "iffy");
        assert_eq!(values.as_text(parsed.unwrap().value.unwrap()).unwrap(), "iffy");
    }

    #[test]
    fn keyed_alternatives_skipping_whitespace_are_still_tried() {
        let mut g = GrammarBuilder::new();
        let kw_if = g.keyword("if");
        let ident = g.add(Parselet::char_class(CharSet::identifier()).repeat());
        let if_stmt = g.add(Parselet::sequence("If", [Slot::syntax(kw_if)]).skip_whitespace());
        let name = g.add(Parselet::sequence("Name", [Slot::property("id", ident)]).skip_whitespace());
        let choice = g.indexed(IndexedChoice::new().with("if", if_stmt).with_default(name));
        g.entry(choice);
        let grammar = g.build().unwrap();
        for source in [" if", "if", "\n\tif"] {
            let (parsed, values) = parse(&grammar, source);
            assert_eq!(values.render(parsed.unwrap().value.unwrap()), "If", "{source:?}");
        }
        let (parsed, values) = parse(&grammar, " iffy");
        assert_eq!(values.render(parsed.unwrap().value.unwrap()), "Name { id: \"iffy\" }");
    }

    #[test]
    fn chains_fold_trailers_into_the_accumulated_value() {
        let mut g = GrammarBuilder::new();
        let ident = g.add(Parselet::char_class(CharSet::identifier()).repeat());
        let name = g.sequence("Name", [Slot::property("id", ident)]);
        let dot = g.literal(".");
        let member = g.sequence("Member", [Slot::syntax(dot), Slot::property("field", ident)]);
        let chain = g.chain(name, member, "target");
        g.entry(chain);
        let grammar = g.build().unwrap();
        let (parsed, values) = parse(&grammar, "a.b.c");
        let parsed = parsed.unwrap();
        assert_eq!(
            values.render(parsed.value.unwrap()),
            "Member { field: \"c\", target: Member { field: \"b\", target: Name { id: \"a\" } } }"
        );
        assert_eq!(parsed.root.slots().len(), 3);

        let (parsed, values) = parse(&grammar, "a");
        assert_eq!(values.render(parsed.unwrap().value.unwrap()), "Name { id: \"a\" }");
    }

    #[test]
    fn trailers_stop_at_whitespace_before_a_mismatch() {
        let mut g = GrammarBuilder::new();
        let ident = g.add(Parselet::char_class(CharSet::identifier()).repeat().skip_whitespace());
        let name = g.sequence("Name", [Slot::property("id", ident)]);
        let dot = g.add(Parselet::literal(".").skip_whitespace());
        let member = g.sequence("Member", [Slot::syntax(dot), Slot::property("field", ident)]);
        let chain = g.chain(name, member, "target");
        let semi = g.add(Parselet::literal(";").skip_whitespace());
        let stmt = g.add(Parselet::group([Slot::pass(chain), Slot::syntax(semi)]));
        g.entry(stmt);
        let grammar = g.build().unwrap();

        let (parsed, values) = parse(&grammar, "a ;");
        assert_eq!(values.render(parsed.unwrap().value.unwrap()), "Name { id: \"a\" }");
        let (parsed, values) = parse(&grammar, "a . b ;");
        assert_eq!(
            values.render(parsed.unwrap().value.unwrap()),
            "Member { field: \"b\", target: Name { id: \"a\" } }"
        );
        let error = parse(&grammar, "a . ;").0.unwrap_err();
        assert_eq!(error.position(), TextSize::from(4));
    }

    #[test]
    fn repeats_stop_at_placeholder_whitespace_before_a_mismatch() {
        let mut g = GrammarBuilder::new();
        let nl = g.newline();
        let open = g.literal("{");
        let close = g.literal("}");
        let ident = g.add(Parselet::char_class(CharSet::identifier()).repeat());
        let semi = g.literal(";");
        let stmt = g.sequence("Stmt", [Slot::property("name", ident), Slot::syntax(semi)]);
        let line = g.add(Parselet::group([Slot::syntax(nl), Slot::pass(stmt)]));
        let stmts = g.add(Parselet::reference(line).repeat().optional());
        let block = g.add(Parselet::sequence(
            "Block",
            [Slot::syntax(open), Slot::property("stmts", stmts), Slot::syntax(nl), Slot::syntax(close)],
        ));
        g.entry(block);
        let grammar = g.build().unwrap();

        let (parsed, values) = parse(&grammar, "{x;\n}");
        assert_eq!(values.render(parsed.unwrap().value.unwrap()), "Block { stmts: [Stmt { name: \"x\" }] }");
        assert!(parse(&grammar, "{\n}").0.is_ok());
        assert!(parse(&grammar, "{ x;\n  y;\n}").0.is_ok());

        // `y` starts an element that then fails: the repeat is committed.
        let error = parse(&grammar, "{x;\n y }").0.unwrap_err();
        assert_eq!(error.position(), TextSize::from(6));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn inputs_beyond_32_bit_offsets_are_refused() {
        assert!(check_len(1 << 20).is_ok());
        assert!(check_len(u32::MAX as usize).is_ok());
        let error = check_len(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(error, ParseError::Budget { kind: BudgetKind::Input, .. }));
        assert_eq!(error.to_string(), "parse budget exhausted: input size limit");
    }

    #[test]
    fn trailing_input_is_reported() {
        let grammar = single(Parselet::literal("a"));
        let error = parse(&grammar, "ab").0.unwrap_err();
        assert_eq!(error.code(), ErrorCode::TrailingInput);
        assert!(error.partial().is_some());
    }

    #[test]
    fn step_budget_aborts() {
        let grammar = single(Parselet::char_class(CharSet::digits()).with_flags(RuleFlags::REPEAT));
        let mut values = SemanticTree::new();
        let mut ids = NodeIds::new();
        let parser = Parser::new(&grammar).with_config(ParseConfig {
            max_steps: Some(0),
            ..ParseConfig::default()
        });
        let error = parser.parse("123", &mut values, &mut ids).unwrap_err();
        assert!(matches!(error, ParseError::Budget { kind: BudgetKind::Steps, .. }));
    }

    #[test]
    fn depth_budget_aborts_deep_nesting() {
        let mut g = GrammarBuilder::new();
        let expr = g.declare("expr");
        let open = g.literal("(");
        let close = g.literal(")");
        let x = g.literal("x");
        let group = g.add(Parselet::group([Slot::syntax(open), Slot::pass(expr), Slot::syntax(close)]));
        g.define(expr, Parselet::choice([x, group]));
        g.entry(expr);
        let grammar = g.build().unwrap();
        let deep = format!("{}x{}", "(".repeat(100), ")".repeat(100));
        let mut values = SemanticTree::new();
        let mut ids = NodeIds::new();
        let parser = Parser::new(&grammar).with_config(ParseConfig {
            max_depth: 50,
            ..ParseConfig::default()
        });
        let error = parser.parse(&deep, &mut values, &mut ids).unwrap_err();
        assert!(matches!(error, ParseError::Budget { kind: BudgetKind::Depth, .. }));
    }

    #[test]
    fn match_at_stops_where_the_rule_stops() {
        let grammar = single(Parselet::char_class(CharSet::digits()).repeat());
        let source: Arc<str> = Arc::from("ab12cd");
        let mut values = SemanticTree::new();
        let mut ids = NodeIds::new();
        let matched = Parser::new(&grammar)
            .match_at(grammar.entry(), &source, TextSize::from(2), &mut values, &mut ids)
            .unwrap();
        assert_eq!(matched.end, TextSize::from(4));
        assert_eq!(matched.node.unwrap().start(), TextSize::from(2));
    }
}
