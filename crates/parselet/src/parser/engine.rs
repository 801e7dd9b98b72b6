//! The recursive matcher behind [`Parser`](super::Parser).

use super::ParseConfig;
use super::recovery::{self, Resync};
use crate::error::{BudgetKind, ParseError, ParseMetrics};
use crate::grammar::{Chain, Grammar, Parselet, ParseletKind, RuleFlags, RuleId, Sequence, Slot, SlotRole};
use crate::text::{StringToken, range_of, size_of};
use crate::tree::{NodeHeader, NodeIds, ParseNode};
use crate::value::{Object, SemanticTree, Value, ValueId};
use smallvec::SmallVec;
use std::sync::Arc;

pub(super) type MatchResult = Result<Match, ParseError>;

/// A successful match. `node` is `None` for a match that produced nothing
/// (an optional miss, a lookahead, end of input).
#[derive(Debug)]
pub(super) struct Match {
    pub node: Option<ParseNode>,
    pub value: Option<ValueId>,
    pub end: usize,
}

impl Match {
    pub(super) const fn empty(offset: usize) -> Self {
        Self {
            node: None,
            value: None,
            end: offset,
        }
    }
}

/// Per-parse state. Offsets are byte offsets into `source`.
pub(super) struct MatchContext<'a> {
    grammar: &'a Grammar,
    config: &'a ParseConfig,
    source: &'a Arc<str>,
    pub(super) values: &'a mut SemanticTree,
    ids: &'a mut NodeIds,
    depth: usize,
    /// Non-zero while probing (negation, lookahead, resync); failures seen
    /// then are not reported and recovery is off.
    pub(super) scanning: usize,
    furthest: Option<ParseError>,
    pub(super) recovered: Vec<ParseError>,
    aborted: Option<ParseError>,
    /// End of the furthest input any attempt so far has looked at.
    examined: usize,
    metrics: ParseMetrics,
}

impl<'a> MatchContext<'a> {
    pub(super) fn new(
        grammar: &'a Grammar,
        config: &'a ParseConfig,
        source: &'a Arc<str>,
        values: &'a mut SemanticTree,
        ids: &'a mut NodeIds,
    ) -> Self {
        Self {
            grammar,
            config,
            source,
            values,
            ids,
            depth: 0,
            scanning: 0,
            furthest: None,
            recovered: Vec::new(),
            aborted: None,
            examined: 0,
            metrics: ParseMetrics::default(),
        }
    }

    /// Treat the input before `examined` as already looked at, as when
    /// re-matching inside a larger parse that got that far.
    pub(super) const fn reading_from(mut self, examined: usize) -> Self {
        self.examined = examined;
        self
    }

    pub(super) const fn examined(&self) -> usize {
        self.examined
    }

    pub(super) fn examine(&mut self, end: usize) {
        self.examined = self.examined.max(end);
    }

    /// End of the character at `at`, or one past the end of input.
    pub(super) fn peek_end(&self, at: usize) -> usize {
        let end = next_char_end(self.input(), at);
        if end == at { at + 1 } else { end }
    }

    pub(super) fn input(&self) -> &'a str {
        let source: &'a Arc<str> = self.source;
        source
    }

    pub(super) fn aborted(&self) -> Option<&ParseError> {
        self.aborted.as_ref()
    }

    pub(super) fn finish(mut self) -> (Vec<ParseError>, ParseMetrics) {
        self.metrics.errors_recovered = self.recovered.len();
        (self.recovered, self.metrics)
    }

    pub(super) fn header(&mut self, start: usize, rule: Option<RuleId>) -> NodeHeader {
        self.metrics.nodes_created += 1;
        NodeHeader::new(self.ids.next_id(), size_of(start), rule)
    }

    /// Attach `value` to `header` as its owner.
    fn owning(&mut self, header: NodeHeader, value: Option<ValueId>) -> NodeHeader {
        if let Some(value) = value {
            self.values.set_owner(value, Some(header.id()));
        }
        header.with_value(value, true)
    }

    /// A view of `source[start..end]`, with a text value when `want`.
    pub(super) fn leaf(&mut self, start: usize, end: usize, rule: Option<RuleId>, want: bool) -> Match {
        let token = self.token(start, end);
        let value = want.then(|| self.values.alloc_parsed(Value::Text(token.clone())));
        let header = self.header(start, rule);
        let header = self.owning(header, value);
        Match {
            node: Some(ParseNode::leaf(header, token)),
            value,
            end,
        }
    }

    pub(super) fn token(&self, start: usize, end: usize) -> StringToken {
        StringToken::shared(Arc::clone(self.source), start, end)
    }

    fn expected(&self, id: RuleId, offset: usize) -> ParseError {
        let next = self.input().get(offset..).and_then(|rest| rest.chars().next());
        let end = offset + next.map_or(0, char::len_utf8);
        ParseError::expected(
            range_of(offset, end),
            self.grammar.describe(id),
            next.is_none(),
            Some(id),
        )
    }

    /// Whether an element starting at `pos` failed past its first token.
    /// Whitespace a `SKIP` flag or placeholder took does not count.
    fn committed(&mut self, error: &ParseError, pos: usize) -> bool {
        let skipped = whitespace_end(self.input(), pos);
        self.examine(self.peek_end(skipped));
        error.position() > size_of(skipped)
    }

    fn note_failure(&mut self, error: &ParseError) {
        match &self.furthest {
            Some(current) if current.position() >= error.position() => {}
            _ => self.furthest = Some(error.clone()),
        }
    }

    fn abort(&mut self, kind: BudgetKind, offset: usize) -> ParseError {
        tracing::warn!(%kind, offset, steps = self.metrics.steps, depth = self.depth, "parse aborted");
        let error = ParseError::Budget {
            span: range_of(offset, offset),
            kind,
            partial: None,
        };
        self.aborted = Some(error.clone());
        error
    }

    /// The error to report when the entry rule failed.
    pub(super) fn top_level_error(&mut self, error: ParseError) -> ParseError {
        if let Some(aborted) = self.aborted.take() {
            return aborted.with_partial(error.partial());
        }
        match self.furthest.take() {
            Some(furthest) if furthest.position() > error.position() => {
                furthest.with_partial(error.partial())
            }
            _ => error,
        }
    }

    /// The error to report when the entry rule stopped before the end.
    pub(super) fn trailing_input(&mut self, end: usize, value: Option<ValueId>) -> ParseError {
        if let Some(furthest) = self.furthest.take()
            && furthest.position() >= size_of(end)
        {
            return furthest.with_partial(value);
        }
        let input = self.input();
        ParseError::TrailingInput {
            span: range_of(end, input.len()),
            found: input.get(end..).unwrap_or_default().chars().take(16).collect(),
            partial: value,
        }
    }

    /// Enter a rule: budgets, tracing, then the flag dispatch.
    pub(super) fn match_rule(&mut self, id: RuleId, offset: usize, want: bool) -> MatchResult {
        if let Some(error) = &self.aborted {
            return Err(error.clone());
        }
        self.metrics.steps += 1;
        if self.config.max_steps.is_some_and(|max| self.metrics.steps > max) {
            return Err(self.abort(BudgetKind::Steps, offset));
        }
        if self.depth >= self.config.max_depth {
            return Err(self.abort(BudgetKind::Depth, offset));
        }
        let grammar = self.grammar;
        let rule = grammar.parselet(id);
        let trace = rule.has(RuleFlags::TRACE);
        if trace {
            tracing::trace!(rule = %id, name = ?rule.name(), offset, "enter");
        }
        let lead = self.examined;
        self.depth += 1;
        let mut result = self.match_flagged(id, rule, offset, want && !rule.has(RuleFlags::DISCARD));
        self.depth -= 1;
        if let Ok(matched) = &mut result
            && let Some(header) = matched.node.as_mut().and_then(ParseNode::header_mut)
        {
            header.read_ahead = Some(size_of(lead.saturating_sub(offset)));
        }
        if trace {
            match &result {
                Ok(matched) => tracing::trace!(rule = %id, end = matched.end, "matched"),
                Err(error) => tracing::trace!(rule = %id, %error, "failed"),
            }
        }
        result
    }

    /// Run `f`, discarding any recoveries it made if it fails.
    fn attempt(&mut self, f: impl FnOnce(&mut Self) -> MatchResult) -> MatchResult {
        let mark = self.recovered.len();
        let result = f(self);
        if result.is_err() {
            self.recovered.truncate(mark);
        }
        result
    }

    fn match_flagged(&mut self, id: RuleId, rule: &'a Parselet, offset: usize, want: bool) -> MatchResult {
        let result = self.attempt(|ctx| {
            if rule.has(RuleFlags::LOOKAHEAD) {
                ctx.match_lookahead(id, rule, offset)
            } else if rule.has(RuleFlags::SKIP) {
                ctx.match_skipping(id, rule, offset, want)
            } else {
                ctx.match_body(id, rule, offset, want)
            }
        });
        let error = match result {
            Ok(matched) => return Ok(matched),
            Err(error) if self.aborted.is_some() => return Err(error),
            Err(error) => error,
        };
        if !rule.has(RuleFlags::NO_ERROR) && self.scanning == 0 {
            self.note_failure(&error);
        }
        if rule.has(RuleFlags::OPTIONAL) && !rule.has(RuleFlags::REPEAT) {
            return Ok(Match::empty(offset));
        }
        Err(error)
    }

    fn match_body(&mut self, id: RuleId, rule: &'a Parselet, offset: usize, want: bool) -> MatchResult {
        if rule.has(RuleFlags::REPEAT) {
            self.match_repeat(id, rule, offset, want)
        } else {
            self.match_single(id, rule, offset, want)
        }
    }

    fn match_lookahead(&mut self, id: RuleId, rule: &'a Parselet, offset: usize) -> MatchResult {
        let start = if rule.has(RuleFlags::SKIP) {
            let start = whitespace_end(self.input(), offset);
            self.examine(self.peek_end(start));
            start
        } else {
            offset
        };
        self.scanning += 1;
        let inner = self.match_core(id, rule, start, false);
        self.scanning -= 1;
        if let Some(aborted) = &self.aborted {
            return Err(aborted.clone());
        }
        match (inner, rule.has(RuleFlags::NEGATE)) {
            (Ok(_), false) | (Err(_), true) => Ok(Match::empty(offset)),
            (Err(error), false) => Err(error),
            (Ok(matched), true) => {
                let end = matched.end.max(next_char_end(self.input(), start));
                Err(ParseError::unexpected(
                    range_of(start, end),
                    self.input().get(start..end).unwrap_or_default(),
                    Some(id),
                ))
            }
        }
    }

    /// Leading whitespace becomes a valueless leaf beside the match proper.
    fn match_skipping(&mut self, id: RuleId, rule: &'a Parselet, offset: usize, want: bool) -> MatchResult {
        let start = whitespace_end(self.input(), offset);
        self.examine(self.peek_end(start));
        if start == offset {
            return self.match_body(id, rule, offset, want);
        }
        let mut inner = self.match_body(id, rule, start, want)?;
        let space = self.leaf(offset, start, None, false).node;
        let owned = inner.node.as_mut().and_then(ParseNode::header_mut).is_some_and(|header| {
            let owned = header.owns_value;
            header.owns_value = false;
            if header.rule == Some(id) {
                header.rule = None;
            }
            owned
        });
        let header = self.header(offset, Some(id));
        let header = if owned {
            self.owning(header, inner.value)
        } else {
            header.with_value(inner.value, false)
        };
        Ok(Match {
            node: Some(ParseNode::branch(header, vec![space, inner.node])),
            value: inner.value,
            end: inner.end,
        })
    }

    fn match_single(&mut self, id: RuleId, rule: &'a Parselet, offset: usize, want: bool) -> MatchResult {
        if rule.has(RuleFlags::NEGATE) {
            self.match_negated(id, rule, offset, want)
        } else {
            self.match_core(id, rule, offset, want)
        }
    }

    /// One character (or a literal's run) where the rule does not match.
    fn match_negated(&mut self, id: RuleId, rule: &'a Parselet, offset: usize, want: bool) -> MatchResult {
        let input = self.input();
        let next = next_char_end(input, offset);
        self.examine(self.peek_end(offset));
        let len = match &rule.kind {
            ParseletKind::Literal(literal) => {
                self.examine(literal.examined_end(input, offset));
                literal.negated_run(input, offset, false)
            }
            ParseletKind::CharClass(set) => match input.get(offset..).and_then(|rest| rest.chars().next()) {
                Some(c) if !set.matches(c) => c.len_utf8(),
                _ => 0,
            },
            _ if next == offset => 0,
            _ => {
                self.scanning += 1;
                let inner = self.match_core(id, rule, offset, false);
                self.scanning -= 1;
                if let Some(aborted) = &self.aborted {
                    return Err(aborted.clone());
                }
                if inner.is_ok() { 0 } else { next - offset }
            }
        };
        if len > 0 {
            return Ok(self.leaf(offset, offset + len, Some(id), want));
        }
        Err(self.negation_failure(id, offset))
    }

    fn negation_failure(&self, id: RuleId, offset: usize) -> ParseError {
        let input = self.input();
        let end = next_char_end(input, offset);
        if end == offset {
            return ParseError::expected(
                range_of(offset, offset),
                compact_str::format_compact!("anything but {}", self.grammar.describe(id)),
                true,
                Some(id),
            );
        }
        ParseError::unexpected(range_of(offset, end), &input[offset..end], Some(id))
    }

    fn match_core(&mut self, id: RuleId, rule: &'a Parselet, offset: usize, want: bool) -> MatchResult {
        let input = self.input();
        match &rule.kind {
            ParseletKind::Literal(literal) => {
                self.examine(literal.examined_end(input, offset));
                match literal.match_at(input, offset) {
                    Some(0) => Ok(Match::empty(offset)),
                    Some(len) => Ok(self.leaf(offset, offset + len, Some(id), want)),
                    None => Err(self.expected(id, offset)),
                }
            }
            ParseletKind::CharClass(set) => {
                self.examine(self.peek_end(offset));
                match set.match_at(input, offset) {
                    Some(len) => Ok(self.leaf(offset, offset + len, Some(id), want)),
                    None => Err(self.expected(id, offset)),
                }
            }
            ParseletKind::Placeholder(_) => {
                let end = whitespace_end(input, offset);
                self.examine(self.peek_end(end));
                if end == offset {
                    return Ok(Match::empty(offset));
                }
                Ok(self.leaf(offset, end, Some(id), false))
            }
            ParseletKind::Sequence(seq) => self.match_sequence(id, rule, seq, offset, want),
            ParseletKind::Choice(alternatives) => self.match_choice(id, alternatives, offset, want),
            ParseletKind::Indexed(choice) => {
                self.examine(choice.examined_end(input, offset));
                let candidates = choice.candidates(input, offset);
                if candidates.is_empty() {
                    return Err(self.expected(id, offset));
                }
                self.match_choice(id, &candidates, offset, want)
            }
            ParseletKind::Chain(chain) => self.match_chain(id, rule, chain, offset, want),
            ParseletKind::Reference(target) => {
                let mut matched = self.match_rule(*target, offset, want)?;
                relabel(&mut matched.node, id);
                Ok(matched)
            }
            ParseletKind::Undefined => Err(self.expected(id, offset)),
        }
    }

    /// Ordered choice. The winning node is relabelled with the choice's
    /// rule, so re-running that rule reproduces the decision.
    fn match_choice(&mut self, id: RuleId, alternatives: &[RuleId], offset: usize, want: bool) -> MatchResult {
        let mut failures: SmallVec<[(RuleId, ParseError); 4]> = SmallVec::new();
        for &alternative in alternatives {
            match self.match_rule(alternative, offset, want) {
                Ok(mut matched) => {
                    relabel(&mut matched.node, id);
                    return Ok(matched);
                }
                Err(error) if self.aborted.is_some() => return Err(error),
                Err(error) => failures.push((alternative, error)),
            }
        }
        let fallback = self.expected(id, offset);
        Err(recovery::aggregate(self.grammar, id, failures, fallback))
    }

    fn may_recover(&self, rule: &Parselet) -> bool {
        rule.has(RuleFlags::SKIP_ON_ERROR)
            && self.config.error_recovery
            && self.scanning == 0
            && self.aborted.is_none()
            && self.recovered.len() < self.config.max_errors
    }

    fn match_sequence(
        &mut self,
        id: RuleId,
        rule: &'a Parselet,
        seq: &'a Sequence,
        offset: usize,
        want: bool,
    ) -> MatchResult {
        let mut object = if want { seq.node_type.clone().map(Object::new) } else { None };
        let mut passed = None;
        let mut children = Vec::with_capacity(seq.slots.len());
        let mut pos = offset;
        let mut partial = false;
        for slot in &seq.slots {
            let slot_want = want && slot.role != SlotRole::Syntax;
            let (node, value) = match self.match_rule(slot.rule, pos, slot_want) {
                Ok(matched) => {
                    pos = matched.end;
                    (matched.node, matched.value)
                }
                Err(error) => {
                    if pos == offset || !self.may_recover(rule) {
                        let value = if error.position() > size_of(offset) {
                            self.sequence_value(object.take(), passed)
                        } else {
                            None
                        };
                        return Err(error.with_partial(value));
                    }
                    match recovery::resync(self, slot.rule, pos, slot_want, error)? {
                        Resync::Matched { node, value, end } => {
                            pos = end;
                            (Some(node), value)
                        }
                        Resync::Exhausted { node } => {
                            children.push(Some(node));
                            pos = self.input().len();
                            partial = true;
                            break;
                        }
                    }
                }
            };
            assign(slot, value, object.as_mut(), &mut passed);
            children.push(node);
        }
        children.resize_with(seq.slots.len(), || None);
        let typed = object.is_some();
        let value = self.sequence_value(object, passed);
        let header = self.header(offset, Some(id));
        let header = if typed {
            self.owning(header, value)
        } else {
            header.with_value(value, false)
        };
        let node = if partial {
            ParseNode::partial(header, children)
        } else {
            ParseNode::branch(header, children)
        };
        Ok(Match {
            node: Some(node),
            value,
            end: pos,
        })
    }

    fn sequence_value(&mut self, object: Option<Object>, passed: Option<ValueId>) -> Option<ValueId> {
        match object {
            Some(object) => Some(self.values.alloc_parsed(Value::Object(object))),
            None => passed,
        }
    }

    /// Operand followed by any number of trailers; each trailer's object
    /// receives the value accumulated so far under the chain's property.
    fn match_chain(
        &mut self,
        id: RuleId,
        rule: &'a Parselet,
        chain: &'a Chain,
        offset: usize,
        want: bool,
    ) -> MatchResult {
        let first = self.match_rule(chain.operand, offset, want)?;
        let mut acc = first.value;
        let mut pos = first.end;
        let mut children = vec![first.node];
        loop {
            match self.match_rule(chain.trailer, pos, want) {
                Ok(matched) if matched.end > pos => {
                    if let (Some(trailer), Some(previous)) = (matched.value, acc) {
                        self.values.init_field(trailer, &chain.property, previous);
                    }
                    acc = matched.value.or(acc);
                    pos = matched.end;
                    children.push(matched.node);
                }
                Ok(_) => break,
                Err(error) if self.aborted.is_some() => return Err(error),
                Err(error) if self.committed(&error, pos) && !rule.has(RuleFlags::PARTIAL_VALUES_ONLY) => {
                    return Err(error.with_partial(acc));
                }
                Err(_) => break,
            }
        }
        let header = self.header(offset, Some(id)).with_value(acc, false);
        Ok(Match {
            node: Some(ParseNode::branch(header, children)),
            value: acc,
            end: pos,
        })
    }

    fn match_repeat(&mut self, id: RuleId, rule: &'a Parselet, offset: usize, want: bool) -> MatchResult {
        if let Some(run) = self.run_length(rule, offset) {
            if run > 0 {
                return Ok(self.leaf(offset, offset + run, Some(id), want));
            }
            if rule.has(RuleFlags::OPTIONAL) {
                return Ok(Match::empty(offset));
            }
            return Err(match &rule.kind {
                ParseletKind::Literal(_) if rule.has(RuleFlags::NEGATE) => self.negation_failure(id, offset),
                _ => self.expected(id, offset),
            });
        }

        let mut pos = offset;
        let mut children = Vec::new();
        let mut items = Vec::new();
        let mut last_error = None;
        loop {
            match self.attempt(|ctx| ctx.match_single(id, rule, pos, want)) {
                Ok(matched) if matched.end > pos => {
                    let mut node = matched.node;
                    demote(&mut node, id);
                    children.push(node);
                    items.extend(matched.value);
                    pos = matched.end;
                }
                Ok(_) => break,
                Err(error) if self.aborted.is_some() => return Err(error),
                Err(error) => {
                    if self.committed(&error, pos) && !rule.has(RuleFlags::PARTIAL_VALUES_ONLY) {
                        let partial = want.then(|| self.values.alloc_parsed(Value::List(items)));
                        return Err(error.with_partial(partial));
                    }
                    if !rule.has(RuleFlags::NO_ERROR) && self.scanning == 0 {
                        self.note_failure(&error);
                    }
                    last_error = Some(error);
                    break;
                }
            }
        }
        if children.is_empty() {
            if rule.has(RuleFlags::OPTIONAL) {
                return Ok(Match::empty(offset));
            }
            return Err(last_error.unwrap_or_else(|| self.expected(id, offset)));
        }
        let value = want.then(|| self.values.alloc_parsed(Value::List(items)));
        let header = self.header(offset, Some(id));
        let header = self.owning(header, value);
        Ok(Match {
            node: Some(ParseNode::branch(header, children)),
            value,
            end: pos,
        })
    }

    /// Length of a maximal literal or character-class run, merged into one
    /// token. `None` for rules that repeat element by element.
    fn run_length(&mut self, rule: &Parselet, offset: usize) -> Option<usize> {
        let input = self.input();
        let negate = rule.has(RuleFlags::NEGATE);
        let run = match &rule.kind {
            ParseletKind::Literal(literal) if negate => literal.negated_run(input, offset, true),
            ParseletKind::Literal(literal) => {
                let mut end = offset;
                while let Some(len) = literal.match_at(input, end).filter(|len| *len > 0) {
                    end += len;
                }
                end - offset
            }
            ParseletKind::CharClass(set) => {
                let rest = input.get(offset..).unwrap_or_default();
                rest.char_indices()
                    .find(|(_, c)| set.matches(*c) == negate)
                    .map_or(rest.len(), |(index, _)| index)
            }
            _ => return None,
        };
        let end = offset + run;
        let examined = match &rule.kind {
            ParseletKind::Literal(literal) => literal
                .examined_end(input, end)
                .max((end + literal.reach()).min(input.len() + 1)),
            _ => self.peek_end(end),
        };
        self.examine(examined);
        Some(run)
    }
}

fn assign(slot: &Slot, value: Option<ValueId>, object: Option<&mut Object>, passed: &mut Option<ValueId>) {
    match &slot.role {
        SlotRole::Property(name) => {
            if let Some(object) = object {
                object.set(name, value);
            }
        }
        SlotRole::Pass => *passed = value,
        SlotRole::Syntax => {}
    }
}

fn relabel(node: &mut Option<ParseNode>, id: RuleId) {
    if let Some(header) = node.as_mut().and_then(ParseNode::header_mut) {
        header.rule = Some(id);
    }
}

/// Repeat elements carry no rule of their own: re-running the repeat's
/// rule at an element would match the whole run.
fn demote(node: &mut Option<ParseNode>, id: RuleId) {
    if let Some(header) = node.as_mut().and_then(ParseNode::header_mut)
        && header.rule == Some(id)
    {
        header.rule = None;
    }
}

pub(super) fn whitespace_end(input: &str, offset: usize) -> usize {
    let rest = input.get(offset..).unwrap_or_default();
    offset + rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len())
}

pub(super) fn next_char_end(input: &str, offset: usize) -> usize {
    offset
        + input
            .get(offset..)
            .and_then(|rest| rest.chars().next())
            .map_or(0, char::len_utf8)
}
