//! # Generation
//!
//! The reverse of parsing: turn a semantic value back into a parse tree
//! whose text, once formatted, parses to the same value.
//!
//! ## Overview
//!
//! Generation walks the grammar the way the parser would have, driven by
//! the shape of the value instead of by input text:
//!
//! - choices try their alternatives in order and keep the first that
//!   succeeds
//! - typed sequences check the object's kind, then render each property
//!   slot from the field of the same name
//! - repeats render list elements one at a time and report how many they
//!   consumed when an element is rejected
//! - lookahead rules render nothing
//! - whitespace becomes [`ParseNode::Format`] placeholders, resolved later
//!   by the [format pass](crate::format)
//!
//! Property reads go through a [`PropertyAccessor`] after consulting the
//! [`MaskTable`]. Chains mask the property they fold values into while
//! choosing how to recurse; [`GenerateContext::with_mask`] scopes each mask
//! so it is always popped on the path that pushed it.
//!
//! ## Restoring
//!
//! [`Generator::restore`] is generation with a previous tree at hand:
//! every value that is still clean, all the way down, is rendered by
//! copying the node that owned it, so untouched code keeps its original
//! formatting and only edited values are regenerated.

mod mask;

pub use mask::{MaskTable, MaskToken};

use crate::error::GenerateError;
use crate::grammar::{Chain, Grammar, Literal, Parselet, ParseletKind, Pattern, RuleFlags, RuleId, Sequence, SlotRole};
use crate::text::{StringToken, TextSize};
use crate::tree::{NodeHeader, NodeId, NodeIds, ParseNode, Placeholder};
use crate::value::{FieldAccessor, PropertyAccessor, SemanticTree, ValueId};
use compact_str::format_compact;
use hashbrown::{HashMap, HashSet};
use std::fmt;

/// Limits for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerateConfig {
    /// Maximum rule nesting
    pub max_depth: usize,
    /// Let [`Generator::restore`] copy nodes of clean values
    pub reuse_clean_subtrees: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            reuse_clean_subtrees: true,
        }
    }
}

/// Counters threaded through one generation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateMetrics {
    /// Rule entries
    pub attempts: usize,
    /// Rule entries that failed
    pub failures: usize,
    pub reused_subtrees: usize,
    pub max_depth: usize,
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub root: ParseNode,
    pub metrics: GenerateMetrics,
}

/// Transient state of one generate or restore call.
pub struct GenerateContext<'v> {
    values: &'v SemanticTree,
    accessor: &'v dyn PropertyAccessor,
    ids: &'v mut NodeIds,
    masks: MaskTable,
    metrics: GenerateMetrics,
    depth: usize,
    /// (rule, value) pairs being generated, to stop unproductive recursion
    active: HashSet<(RuleId, ValueId), ahash::RandomState>,
    /// Nodes of the previous tree that own a value, by id
    previous: HashMap<NodeId, &'v ParseNode, ahash::RandomState>,
}

impl fmt::Debug for GenerateContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateContext")
            .field("masks", &self.masks)
            .field("metrics", &self.metrics)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<'v> GenerateContext<'v> {
    pub fn new(values: &'v SemanticTree, accessor: &'v dyn PropertyAccessor, ids: &'v mut NodeIds) -> Self {
        Self {
            values,
            accessor,
            ids,
            masks: MaskTable::new(),
            metrics: GenerateMetrics::default(),
            depth: 0,
            active: HashSet::default(),
            previous: HashMap::default(),
        }
    }

    #[must_use]
    pub const fn values(&self) -> &'v SemanticTree {
        self.values
    }

    #[must_use]
    pub const fn masks(&self) -> &MaskTable {
        &self.masks
    }

    #[must_use]
    pub const fn metrics(&self) -> &GenerateMetrics {
        &self.metrics
    }

    /// `object.key` as generation sees it: the innermost mask, else the
    /// accessor.
    #[must_use]
    pub fn property(&self, object: ValueId, key: &str) -> Option<ValueId> {
        self.masks
            .lookup(object, key)
            .unwrap_or_else(|| self.accessor.get(self.values, object, key))
    }

    /// Run `f` with `object.key` reading as `value`. The mask is popped
    /// before returning, whatever `f` returns.
    pub fn with_mask<T>(
        &mut self,
        object: ValueId,
        key: &str,
        value: Option<ValueId>,
        f: impl FnOnce(&mut Self) -> Result<T, GenerateError>,
    ) -> Result<T, GenerateError> {
        let token = self.masks.push(object, key, value);
        let result = f(self);
        self.masks.pop(token)?;
        result
    }

    fn header(&mut self, rule: RuleId) -> NodeHeader {
        NodeHeader::new(self.ids.next_id(), TextSize::default(), Some(rule)).generated()
    }

    fn remember(&mut self, root: &'v ParseNode) {
        for node in root.walk() {
            if let Some(header) = node.header()
                && header.owns_value()
            {
                self.previous.insert(header.id(), node);
            }
        }
    }

    /// A copy of the node that produced `value`, if the value is unchanged
    /// since and the node was produced by `rule`. Repeat elements carry no
    /// rule, so `element` accepts those too.
    fn reuse(&mut self, rule: RuleId, value: ValueId, element: bool) -> Option<ParseNode> {
        if self.previous.is_empty() {
            return None;
        }
        let owner = self.values.owner(value)?;
        let node = *self.previous.get(&owner)?;
        let fits = node.rule() == Some(rule) || (element && node.rule().is_none());
        if !fits || node.is_error_node() || !self.values.is_clean_deep(value) {
            return None;
        }
        self.metrics.reused_subtrees += 1;
        tracing::debug!(rule = %rule, value = %value, node = %owner, "reusing clean subtree");
        Some(node.deep_copy(self.ids))
    }

    fn text(&self, rule: RuleId, value: Option<ValueId>, want: bool) -> Result<(StringToken, ValueId), GenerateError> {
        let Some(value) = value.filter(|_| want) else {
            return Err(GenerateError::NoValue { rule, slot: None });
        };
        match self.values.as_text(value) {
            Some(text) => Ok((text.clone(), value)),
            None => Err(GenerateError::Rejected {
                rule,
                value,
                reason: "expected text".into(),
            }),
        }
    }
}

/// Renders semantic values through a grammar.
#[derive(Clone)]
pub struct Generator<'g> {
    grammar: &'g Grammar,
    accessor: &'g dyn PropertyAccessor,
    config: GenerateConfig,
}

impl fmt::Debug for Generator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("rules", &self.grammar.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

type Generate = Result<Option<ParseNode>, GenerateError>;

impl<'g> Generator<'g> {
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            accessor: &FieldAccessor,
            config: GenerateConfig::default(),
        }
    }

    #[must_use]
    pub fn with_accessor(mut self, accessor: &'g dyn PropertyAccessor) -> Self {
        self.accessor = accessor;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: GenerateConfig) -> Self {
        self.config = config;
        self
    }

    /// Build a fresh tree for `value` through `rule`.
    ///
    /// On success the created nodes become the owners of the values they
    /// render, and `value` is marked clean.
    pub fn generate(
        &self,
        values: &mut SemanticTree,
        value: ValueId,
        rule: RuleId,
        ids: &mut NodeIds,
    ) -> Result<Generated, GenerateError> {
        self.run(values, value, rule, None, ids)
    }

    /// Like [`generate`](Self::generate), copying the nodes of `previous`
    /// for every value that is still clean.
    pub fn restore(
        &self,
        values: &mut SemanticTree,
        value: ValueId,
        rule: RuleId,
        previous: &ParseNode,
        ids: &mut NodeIds,
    ) -> Result<Generated, GenerateError> {
        self.run(values, value, rule, Some(previous), ids)
    }

    fn run(
        &self,
        values: &mut SemanticTree,
        value: ValueId,
        rule: RuleId,
        previous: Option<&ParseNode>,
        ids: &mut NodeIds,
    ) -> Result<Generated, GenerateError> {
        let (mut root, metrics) = {
            let mut ctx = GenerateContext::new(&*values, self.accessor, ids);
            if self.config.reuse_clean_subtrees
                && let Some(previous) = previous
            {
                ctx.remember(previous);
            }
            let node = self.generate_rule(&mut ctx, rule, Some(value), true)?;
            ctx.masks.check_depth(0)?;
            let root = match node {
                Some(node) => node,
                None => ParseNode::branch(ctx.header(rule), Vec::new()),
            };
            (root, ctx.metrics)
        };
        root.for_each_header(&mut |header| {
            if header.owns_value
                && let Some(value) = header.value
            {
                values.set_owner(value, Some(header.id));
            }
        });
        values.mark_clean_deep(value);
        tracing::trace!(
            rule = %rule,
            attempts = metrics.attempts,
            failures = metrics.failures,
            reused = metrics.reused_subtrees,
            "generation finished"
        );
        Ok(Generated { root, metrics })
    }

    fn generate_rule(&self, ctx: &mut GenerateContext<'_>, id: RuleId, value: Option<ValueId>, want: bool) -> Generate {
        if ctx.depth >= self.config.max_depth {
            return Err(GenerateError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        let rule = self.grammar.parselet(id);
        if rule.has(RuleFlags::LOOKAHEAD) {
            return Ok(None);
        }
        let want = want && !rule.has(RuleFlags::DISCARD);
        let value = value.filter(|_| want);
        ctx.metrics.attempts += 1;
        if let Some(value) = value
            && !rule.accepts(ctx.values, value)
        {
            ctx.metrics.failures += 1;
            return Err(GenerateError::Rejected {
                rule: id,
                value,
                reason: "accept predicate".into(),
            });
        }
        if let Some(value) = value
            && let Some(node) = ctx.reuse(id, value, false)
        {
            return Ok(Some(node));
        }
        let key = value.map(|value| (id, value));
        if let Some((rule, value)) = key
            && !ctx.active.insert((rule, value))
        {
            ctx.metrics.failures += 1;
            return Err(GenerateError::Cycle { rule, value });
        }

        ctx.depth += 1;
        ctx.metrics.max_depth = ctx.metrics.max_depth.max(ctx.depth);
        if rule.has(RuleFlags::TRACE) {
            tracing::trace!(rule = %id, name = ?rule.name(), value = ?value, "generate");
        }
        let result = self.generate_flagged(ctx, id, rule, value, want);
        ctx.depth -= 1;
        if let Some(key) = key {
            ctx.active.remove(&key);
        }
        if let Err(error) = &result {
            ctx.metrics.failures += 1;
            if rule.has(RuleFlags::TRACE) {
                tracing::trace!(rule = %id, %error, "generate failed");
            }
        }
        result
    }

    fn generate_flagged(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        rule: &'g Parselet,
        value: Option<ValueId>,
        want: bool,
    ) -> Generate {
        let optional = rule.has(RuleFlags::OPTIONAL);
        if optional && want && value.is_none() {
            return Ok(None);
        }
        let result = if rule.has(RuleFlags::SKIP) {
            self.generate_skipping(ctx, id, rule, value, want)
        } else {
            self.generate_body(ctx, id, rule, value, want)
        };
        match result {
            Err(error) if optional && !rule.has(RuleFlags::REPEAT) && !error.is_invariant_violation() => Ok(None),
            other => other,
        }
    }

    fn generate_body(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        rule: &'g Parselet,
        value: Option<ValueId>,
        want: bool,
    ) -> Generate {
        if rule.has(RuleFlags::REPEAT) {
            self.generate_repeat(ctx, id, rule, value, want)
        } else {
            self.generate_single(ctx, id, rule, value, want)
        }
    }

    /// A space placeholder in front of the rule, mirroring the whitespace
    /// leaf a parse keeps.
    fn generate_skipping(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        rule: &'g Parselet,
        value: Option<ValueId>,
        want: bool,
    ) -> Generate {
        let Some(mut inner) = self.generate_body(ctx, id, rule, value, want)? else {
            return Ok(None);
        };
        let mut owned = false;
        if let Some(header) = inner.header_mut() {
            owned = header.owns_value;
            header.owns_value = false;
            if header.rule == Some(id) {
                header.rule = None;
            }
        }
        let value = inner.value();
        let header = ctx.header(id).with_value(value, owned);
        Ok(Some(ParseNode::branch(
            header,
            vec![Some(ParseNode::Format(Placeholder::Space)), Some(inner)],
        )))
    }

    fn generate_single(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        rule: &'g Parselet,
        value: Option<ValueId>,
        want: bool,
    ) -> Generate {
        if rule.has(RuleFlags::NEGATE) {
            return self.generate_negated(ctx, id, rule, value, want, false);
        }
        match &rule.kind {
            ParseletKind::Literal(literal) => self.generate_literal(ctx, id, literal, value, want, false),
            ParseletKind::CharClass(set) => {
                let (text, value) = ctx.text(id, value, want)?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if set.matches(c) => Ok(Some(text_leaf(ctx, id, text, value))),
                    _ => Err(mismatch(id, set.describe(), &text)),
                }
            }
            ParseletKind::Placeholder(placeholder) => Ok(Some(ParseNode::Format(*placeholder))),
            ParseletKind::Sequence(seq) => self.generate_sequence(ctx, id, seq, value, want),
            ParseletKind::Choice(alternatives) => self.generate_choice(ctx, id, alternatives, value, want),
            ParseletKind::Indexed(choice) => self.generate_choice(ctx, id, choice.alternatives(), value, want),
            ParseletKind::Chain(chain) => self.generate_chain(ctx, id, chain, value, want),
            ParseletKind::Reference(target) => {
                let mut node = self.generate_rule(ctx, *target, value, want)?;
                relabel(&mut node, id);
                Ok(node)
            }
            ParseletKind::Undefined => Err(GenerateError::NoAlternative { rule: id, last: None }),
        }
    }

    fn generate_literal(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        literal: &Literal,
        value: Option<ValueId>,
        want: bool,
        repeat: bool,
    ) -> Generate {
        match literal.pattern() {
            Pattern::Eof => Ok(None),
            Pattern::Text(text) if !want => {
                let header = ctx.header(id);
                Ok(Some(ParseNode::leaf(header, text.clone())))
            }
            _ => {
                let (text, value) = ctx.text(id, value, want)?;
                if literal.accepts(&text, repeat) {
                    Ok(Some(text_leaf(ctx, id, text, value)))
                } else {
                    Err(mismatch(id, literal.describe(), &text))
                }
            }
        }
    }

    /// Text that must not contain what the rule matches.
    fn generate_negated(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        rule: &'g Parselet,
        value: Option<ValueId>,
        want: bool,
        repeat: bool,
    ) -> Generate {
        let (text, value) = ctx.text(id, value, want)?;
        let fits = !text.is_empty()
            && match &rule.kind {
                ParseletKind::Literal(literal) => literal.negated_run(&text, 0, repeat) == text.len(),
                ParseletKind::CharClass(set) => {
                    text.chars().all(|c| !set.matches(c)) && (repeat || text.chars().count() == 1)
                }
                _ => repeat || text.chars().count() == 1,
            };
        if fits {
            Ok(Some(text_leaf(ctx, id, text, value)))
        } else {
            Err(GenerateError::Rejected {
                rule: id,
                value,
                reason: format_compact!("{:?} contains what the rule excludes", text.as_str()),
            })
        }
    }

    fn generate_repeat(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        rule: &'g Parselet,
        value: Option<ValueId>,
        want: bool,
    ) -> Generate {
        let optional = rule.has(RuleFlags::OPTIONAL);
        match &rule.kind {
            ParseletKind::Literal(_) | ParseletKind::CharClass(_) if rule.has(RuleFlags::NEGATE) => {
                return self.generate_negated(ctx, id, rule, value, want, true);
            }
            ParseletKind::Literal(literal) => return self.generate_literal(ctx, id, literal, value, want, true),
            ParseletKind::CharClass(set) => {
                let (text, value) = ctx.text(id, value, want)?;
                if !text.is_empty() && text.chars().all(|c| set.matches(c)) {
                    return Ok(Some(text_leaf(ctx, id, text, value)));
                }
                return Err(mismatch(id, set.describe(), &text));
            }
            _ => {}
        }

        if !want {
            let mut element = self.generate_single(ctx, id, rule, None, false)?;
            demote(&mut element, id);
            let header = ctx.header(id);
            return Ok(Some(ParseNode::branch(header, vec![element])));
        }
        let Some(list) = value else {
            return Err(GenerateError::NoValue { rule: id, slot: None });
        };
        let values = ctx.values;
        let Some(items) = values.elements(list) else {
            return Err(GenerateError::Rejected {
                rule: id,
                value: list,
                reason: "expected a list".into(),
            });
        };
        if items.is_empty() && !optional {
            return Err(GenerateError::NoValue { rule: id, slot: None });
        }
        let mut children = Vec::with_capacity(items.len());
        for (consumed, item) in items.iter().enumerate() {
            let element = match ctx.reuse(id, *item, true) {
                Some(node) => Ok(Some(node)),
                None => self.generate_single(ctx, id, rule, Some(*item), true),
            };
            match element {
                Ok(mut node) => {
                    demote(&mut node, id);
                    children.push(node);
                }
                Err(error) if error.is_invariant_violation() => return Err(error),
                Err(error) => {
                    tracing::trace!(rule = %id, consumed, %error, "repeat stopped at a rejected element");
                    return Err(GenerateError::NotEndOfInput {
                        rule: id,
                        consumed,
                        total: items.len(),
                    });
                }
            }
        }
        let header = ctx.header(id).with_value(Some(list), true);
        Ok(Some(ParseNode::branch(header, children)))
    }

    fn generate_sequence(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        seq: &'g Sequence,
        value: Option<ValueId>,
        want: bool,
    ) -> Generate {
        let object = match seq.node_type.as_ref().filter(|_| want) {
            Some(kind) => {
                let Some(object) = value else {
                    return Err(GenerateError::NoValue { rule: id, slot: None });
                };
                if ctx.accessor.type_name(ctx.values, object) != Some(kind.as_str()) {
                    return Err(GenerateError::Rejected {
                        rule: id,
                        value: object,
                        reason: format_compact!("expected {kind}"),
                    });
                }
                Some(object)
            }
            None => None,
        };
        if let Some(value) = value
            && object.is_none()
            && seq.pass_slot().is_none()
        {
            return Err(GenerateError::Rejected {
                rule: id,
                value,
                reason: "rule produces no value".into(),
            });
        }

        let mut children = Vec::with_capacity(seq.slots.len());
        for slot in &seq.slots {
            let node = match (&slot.role, object) {
                (SlotRole::Property(name), Some(object)) => {
                    let field = ctx.property(object, name);
                    self.generate_rule(ctx, slot.rule, field, true)
                        .map_err(|error| match error {
                            GenerateError::NoValue { slot: None, .. } if field.is_none() => {
                                GenerateError::NoValue {
                                    rule: id,
                                    slot: Some(name.clone()),
                                }
                            }
                            other => other,
                        })?
                }
                (SlotRole::Pass, None) if want => self.generate_rule(ctx, slot.rule, value, true)?,
                _ => self.generate_rule(ctx, slot.rule, None, false)?,
            };
            children.push(node);
        }
        let header = ctx.header(id).with_value(value, object.is_some());
        Ok(Some(ParseNode::branch(header, children)))
    }

    fn generate_choice(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        alternatives: &[RuleId],
        value: Option<ValueId>,
        want: bool,
    ) -> Generate {
        let mut last = None;
        for &alternative in alternatives {
            let depth = ctx.masks.depth();
            let result = self.generate_rule(ctx, alternative, value, want);
            ctx.masks.check_depth(depth)?;
            match result {
                Ok(mut node) => {
                    relabel(&mut node, id);
                    return Ok(node);
                }
                Err(error) if error.is_invariant_violation() => return Err(error),
                Err(error) => last = Some(Box::new(error)),
            }
        }
        Err(GenerateError::NoAlternative { rule: id, last })
    }

    /// Unfold a value built by a chain: peel trailer-typed values off
    /// through the chain's property, render the innermost through the
    /// operand and the rest as trailers. A value that is not a trailer,
    /// or whose trailers fail, is rendered by the operand alone with the
    /// property masked.
    fn generate_chain(
        &self,
        ctx: &mut GenerateContext<'_>,
        id: RuleId,
        chain: &'g Chain,
        value: Option<ValueId>,
        want: bool,
    ) -> Generate {
        let Some(top) = value.filter(|_| want) else {
            let operand = self.generate_rule(ctx, chain.operand, value, want)?;
            let header = ctx.header(id);
            return Ok(Some(ParseNode::branch(header, vec![operand])));
        };

        let trailer_types = self.grammar.result_types(chain.trailer);
        let mut trailers = Vec::new();
        let mut innermost = top;
        while ctx
            .accessor
            .type_name(ctx.values, innermost)
            .is_some_and(|kind| trailer_types.iter().any(|t| t.as_str() == kind))
        {
            let Some(inner) = ctx.property(innermost, &chain.property) else {
                break;
            };
            trailers.push(innermost);
            innermost = inner;
        }

        if !trailers.is_empty() {
            let depth = ctx.masks.depth();
            match self.generate_trailers(ctx, chain, innermost, &trailers) {
                Ok(children) => {
                    let header = ctx.header(id).with_value(Some(top), false);
                    return Ok(Some(ParseNode::branch(header, children)));
                }
                Err(error) if error.is_invariant_violation() => return Err(error),
                Err(error) => {
                    ctx.masks.check_depth(depth)?;
                    tracing::trace!(rule = %id, %error, "chain falls back to its operand");
                }
            }
        }

        let operand = ctx.with_mask(top, &chain.property, None, |ctx| {
            self.generate_rule(ctx, chain.operand, Some(top), true)
        })?;
        let header = ctx.header(id).with_value(Some(top), false);
        Ok(Some(ParseNode::branch(header, vec![operand])))
    }

    fn generate_trailers(
        &self,
        ctx: &mut GenerateContext<'_>,
        chain: &'g Chain,
        innermost: ValueId,
        trailers: &[ValueId],
    ) -> Result<Vec<Option<ParseNode>>, GenerateError> {
        let mut children = Vec::with_capacity(trailers.len() + 1);
        children.push(self.generate_rule(ctx, chain.operand, Some(innermost), true)?);
        for &trailer in trailers.iter().rev() {
            let node = ctx.with_mask(trailer, &chain.property, None, |ctx| {
                self.generate_rule(ctx, chain.trailer, Some(trailer), true)
            })?;
            children.push(node);
        }
        Ok(children)
    }
}

fn text_leaf(ctx: &mut GenerateContext<'_>, id: RuleId, text: StringToken, value: ValueId) -> ParseNode {
    let header = ctx.header(id).with_value(Some(value), true);
    ParseNode::leaf(header, text)
}

fn mismatch(rule: RuleId, expected: compact_str::CompactString, found: &str) -> GenerateError {
    GenerateError::LiteralMismatch {
        rule,
        expected,
        found: found.into(),
    }
}

fn relabel(node: &mut Option<ParseNode>, id: RuleId) {
    if let Some(header) = node.as_mut().and_then(ParseNode::header_mut) {
        header.rule = Some(id);
    }
}

fn demote(node: &mut Option<ParseNode>, id: RuleId) {
    if let Some(header) = node.as_mut().and_then(ParseNode::header_mut)
        && header.rule == Some(id)
    {
        header.rule = None;
    }
}
