//! # Grammar
//!
//! A grammar is a table of [`Parselet`]s addressed by [`RuleId`]. Each
//! parselet is one matching primitive plus a set of [`RuleFlags`] that
//! modify it (repeat, optional, lookahead and so on). The same table drives
//! parsing (text to tree and value) and generation (value to tree).
//!
//! ## Building
//!
//! Grammars are assembled with a [`GrammarBuilder`]. Rules may be declared
//! by name before they are defined, which is how recursive rules are
//! written:
//!
//! ```rust
//! use parselet::grammar::{CharSet, GrammarBuilder, Parselet, Slot};
//!
//! let mut g = GrammarBuilder::new();
//! let expr = g.declare("expr");
//! let open = g.add(Parselet::literal("("));
//! let close = g.add(Parselet::literal(")"));
//! let digits = g.add(Parselet::char_class(CharSet::digits()).repeat());
//! let group = g.add(Parselet::group([Slot::syntax(open), Slot::pass(expr), Slot::syntax(close)]));
//! g.define(expr, Parselet::choice([digits, group]));
//! g.entry(expr);
//! let grammar = g.build().unwrap();
//! assert_eq!(grammar.rule_by_name("expr"), Some(expr));
//! ```
//!
//! ## Result types
//!
//! Typed sequences produce objects whose kind is the sequence's node type.
//! [`Grammar::result_types`] computes, for any rule, the set of object
//! kinds it can produce; generation uses it to route values to the rules
//! that can render them.

mod builder;
mod indexed;
mod literal;
mod validate;

pub use builder::GrammarBuilder;
pub use indexed::IndexedChoice;
pub use literal::{CharSet, Literal, LiteralSet, Pattern};

use crate::error::GrammarError;
use crate::intern::{FrozenInterner, InternedStr};
use crate::tree::Placeholder;
use crate::value::{SemanticTree, ValueId};
use compact_str::{CompactString, format_compact};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

/// Index of a rule in its [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleId(u32);

impl RuleId {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Modifiers applied on top of a parselet's matching primitive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RuleFlags(u16);

impl RuleFlags {
    pub const NONE: Self = Self(0);
    /// One or more; with `OPTIONAL`, zero or more
    pub const REPEAT: Self = Self(1 << 0);
    pub const OPTIONAL: Self = Self(1 << 1);
    /// Match without consuming
    pub const LOOKAHEAD: Self = Self(1 << 2);
    /// Invert the match; on literals, consume what is not the literal
    pub const NEGATE: Self = Self(1 << 3);
    /// Consume leading whitespace before matching
    pub const SKIP: Self = Self(1 << 4);
    /// Keep the node, drop the value
    pub const DISCARD: Self = Self(1 << 5);
    /// Failures never take part in error aggregation
    pub const NO_ERROR: Self = Self(1 << 6);
    /// Log entry and exit at debug level
    pub const TRACE: Self = Self(1 << 7);
    /// On a slot failure, skip ahead until the slot matches again
    pub const SKIP_ON_ERROR: Self = Self(1 << 8);
    /// A repeat may stop short of a committed failure, or of the end of a
    /// list during generation
    pub const PARTIAL_VALUES_ONLY: Self = Self(1 << 9);

    const NAMES: [(Self, &'static str); 10] = [
        (Self::REPEAT, "REPEAT"),
        (Self::OPTIONAL, "OPTIONAL"),
        (Self::LOOKAHEAD, "LOOKAHEAD"),
        (Self::NEGATE, "NEGATE"),
        (Self::SKIP, "SKIP"),
        (Self::DISCARD, "DISCARD"),
        (Self::NO_ERROR, "NO_ERROR"),
        (Self::TRACE, "TRACE"),
        (Self::SKIP_ON_ERROR, "SKIP_ON_ERROR"),
        (Self::PARTIAL_VALUES_ONLY, "PARTIAL_VALUES_ONLY"),
    ];

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for RuleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for RuleFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for RuleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}

/// What a sequence does with the value of one of its slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRole {
    /// Store the value under a property of the sequence's object
    Property(CompactString),
    /// Forward the value as the sequence's own (untyped sequences only)
    Pass,
    /// Match for structure only
    Syntax,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub rule: RuleId,
    pub role: SlotRole,
}

impl Slot {
    #[must_use]
    pub fn property(name: impl Into<CompactString>, rule: RuleId) -> Self {
        Self {
            rule,
            role: SlotRole::Property(name.into()),
        }
    }

    #[must_use]
    pub const fn pass(rule: RuleId) -> Self {
        Self {
            rule,
            role: SlotRole::Pass,
        }
    }

    #[must_use]
    pub const fn syntax(rule: RuleId) -> Self {
        Self {
            rule,
            role: SlotRole::Syntax,
        }
    }
}

/// Ordered slots, optionally producing a typed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub node_type: Option<CompactString>,
    pub slots: Vec<Slot>,
}

impl Sequence {
    /// The slot whose value is forwarded, if any.
    #[must_use]
    pub fn pass_slot(&self) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.role == SlotRole::Pass)
    }
}

/// Result chaining: an operand followed by any number of trailers.
///
/// Each trailer's object receives the value built so far under `property`
/// and becomes the new accumulated value, so `f(x).y` folds into
/// `Member { target: Call { target: f, .. }, .. }` while the parse tree
/// stays flat: one branch holding the operand and the trailers in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub operand: RuleId,
    pub trailer: RuleId,
    pub property: CompactString,
}

/// The matching primitive of a rule.
#[derive(Debug, Clone)]
pub enum ParseletKind {
    Literal(Literal),
    CharClass(CharSet),
    Sequence(Sequence),
    Choice(Vec<RuleId>),
    Indexed(IndexedChoice),
    Chain(Chain),
    Reference(RuleId),
    /// Whitespace in the source; a formatting placeholder when generating
    Placeholder(Placeholder),
    /// Declared but not yet defined
    Undefined,
}

/// Predicate a value must satisfy before a rule will render it.
pub type AcceptFn = Arc<dyn Fn(&SemanticTree, ValueId) -> bool + Send + Sync>;

/// One rule: a matching primitive and its modifiers.
#[derive(Clone)]
pub struct Parselet {
    pub(crate) name: Option<CompactString>,
    pub(crate) kind: ParseletKind,
    pub(crate) flags: RuleFlags,
    pub(crate) style: Option<CompactString>,
    pub(crate) accept: Option<AcceptFn>,
}

impl fmt::Debug for Parselet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parselet")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("style", &self.style)
            .field("accept", &self.accept.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Parselet {
    #[must_use]
    pub const fn new(kind: ParseletKind) -> Self {
        Self {
            name: None,
            kind,
            flags: RuleFlags::NONE,
            style: None,
            accept: None,
        }
    }

    #[must_use]
    pub fn literal(text: &'static str) -> Self {
        Self::new(ParseletKind::Literal(Literal::text(text)))
    }

    #[must_use]
    pub fn literal_with(literal: Literal) -> Self {
        Self::new(ParseletKind::Literal(literal))
    }

    #[must_use]
    pub fn any_char() -> Self {
        Self::new(ParseletKind::Literal(Literal::any_char()))
    }

    #[must_use]
    pub fn eof() -> Self {
        Self::new(ParseletKind::Literal(Literal::eof()))
    }

    #[must_use]
    pub const fn char_class(set: CharSet) -> Self {
        Self::new(ParseletKind::CharClass(set))
    }

    /// A typed sequence producing `node_type` objects.
    #[must_use]
    pub fn sequence(node_type: impl Into<CompactString>, slots: impl IntoIterator<Item = Slot>) -> Self {
        Self::new(ParseletKind::Sequence(Sequence {
            node_type: Some(node_type.into()),
            slots: slots.into_iter().collect(),
        }))
    }

    /// An untyped sequence; its value is that of its pass slot, if any.
    #[must_use]
    pub fn group(slots: impl IntoIterator<Item = Slot>) -> Self {
        Self::new(ParseletKind::Sequence(Sequence {
            node_type: None,
            slots: slots.into_iter().collect(),
        }))
    }

    #[must_use]
    pub fn choice(alternatives: impl IntoIterator<Item = RuleId>) -> Self {
        Self::new(ParseletKind::Choice(alternatives.into_iter().collect()))
    }

    #[must_use]
    pub const fn indexed(choice: IndexedChoice) -> Self {
        Self::new(ParseletKind::Indexed(choice))
    }

    #[must_use]
    pub fn chain(operand: RuleId, trailer: RuleId, property: impl Into<CompactString>) -> Self {
        Self::new(ParseletKind::Chain(Chain {
            operand,
            trailer,
            property: property.into(),
        }))
    }

    #[must_use]
    pub const fn reference(rule: RuleId) -> Self {
        Self::new(ParseletKind::Reference(rule))
    }

    /// Optional whitespace; a space placeholder when generating.
    #[must_use]
    pub const fn space() -> Self {
        Self::new(ParseletKind::Placeholder(Placeholder::Space))
    }

    /// Optional whitespace; a newline placeholder when generating.
    #[must_use]
    pub const fn newline() -> Self {
        Self::new(ParseletKind::Placeholder(Placeholder::Newline))
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: RuleFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    #[must_use]
    pub const fn repeat(self) -> Self {
        self.with_flags(RuleFlags::REPEAT)
    }

    #[must_use]
    pub const fn optional(self) -> Self {
        self.with_flags(RuleFlags::OPTIONAL)
    }

    #[must_use]
    pub const fn lookahead(self) -> Self {
        self.with_flags(RuleFlags::LOOKAHEAD)
    }

    #[must_use]
    pub const fn negate(self) -> Self {
        self.with_flags(RuleFlags::NEGATE)
    }

    #[must_use]
    pub const fn skip_whitespace(self) -> Self {
        self.with_flags(RuleFlags::SKIP)
    }

    #[must_use]
    pub const fn discard(self) -> Self {
        self.with_flags(RuleFlags::DISCARD)
    }

    #[must_use]
    pub const fn no_error(self) -> Self {
        self.with_flags(RuleFlags::NO_ERROR)
    }

    #[must_use]
    pub const fn trace(self) -> Self {
        self.with_flags(RuleFlags::TRACE)
    }

    #[must_use]
    pub const fn skip_on_error(self) -> Self {
        self.with_flags(RuleFlags::SKIP_ON_ERROR)
    }

    #[must_use]
    pub const fn partial_values_only(self) -> Self {
        self.with_flags(RuleFlags::PARTIAL_VALUES_ONLY)
    }

    /// Style name reported to a [`StyleSink`](crate::format::StyleSink).
    #[must_use]
    pub fn styled(mut self, style: impl Into<CompactString>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Only render values this predicate accepts.
    #[must_use]
    pub fn accepting(mut self, accept: impl Fn(&SemanticTree, ValueId) -> bool + Send + Sync + 'static) -> Self {
        self.accept = Some(Arc::new(accept));
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub const fn kind(&self) -> &ParseletKind {
        &self.kind
    }

    #[must_use]
    pub const fn flags(&self) -> RuleFlags {
        self.flags
    }

    #[must_use]
    pub const fn has(&self, flag: RuleFlags) -> bool {
        self.flags.contains(flag)
    }

    #[must_use]
    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub(crate) fn accepts(&self, values: &SemanticTree, value: ValueId) -> bool {
        self.accept.as_ref().is_none_or(|accept| accept(values, value))
    }

    /// Rules this parselet calls directly.
    pub fn referenced(&self) -> SmallVec<[RuleId; 4]> {
        match &self.kind {
            ParseletKind::Sequence(seq) => seq.slots.iter().map(|slot| slot.rule).collect(),
            ParseletKind::Choice(alts) => alts.iter().copied().collect(),
            ParseletKind::Indexed(choice) => choice.alternatives().iter().copied().collect(),
            ParseletKind::Chain(chain) => smallvec::smallvec![chain.operand, chain.trailer],
            ParseletKind::Reference(target) => smallvec::smallvec![*target],
            ParseletKind::Literal(_)
            | ParseletKind::CharClass(_)
            | ParseletKind::Placeholder(_)
            | ParseletKind::Undefined => SmallVec::new(),
        }
    }
}

/// A validated, immutable-by-default rule table.
#[derive(Debug, Clone)]
pub struct Grammar {
    rules: Vec<Parselet>,
    names: Arc<FrozenInterner>,
    by_name: HashMap<InternedStr, RuleId, ahash::RandomState>,
    entry: RuleId,
}

impl Grammar {
    #[must_use]
    pub const fn entry(&self) -> RuleId {
        self.entry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn rule(&self, id: RuleId) -> Option<&Parselet> {
        self.rules.get(id.index())
    }

    /// Mutable access for grammar composition. Changing a rule while a parse
    /// or generation borrows the grammar is ruled out by the borrow checker.
    pub fn rule_mut(&mut self, id: RuleId) -> Option<&mut Parselet> {
        self.rules.get_mut(id.index())
    }

    /// Validated lookup for ids known to belong to this grammar.
    pub(crate) fn parselet(&self, id: RuleId) -> &Parselet {
        &self.rules[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Parselet)> {
        self.rules.iter().enumerate().map(|(index, rule)| (rule_id(index), rule))
    }

    #[must_use]
    pub fn rule_by_name(&self, name: &str) -> Option<RuleId> {
        let key = self.names.get(name)?;
        self.by_name.get(&key).copied()
    }

    /// Short description of a rule for error messages: its name, or what it
    /// matches.
    #[must_use]
    pub fn describe(&self, id: RuleId) -> CompactString {
        let Some(rule) = self.rule(id) else {
            return format_compact!("{id}");
        };
        if let Some(name) = &rule.name {
            return name.clone();
        }
        match &rule.kind {
            ParseletKind::Literal(literal) => literal.describe(),
            ParseletKind::CharClass(set) => set.describe(),
            ParseletKind::Sequence(Sequence {
                node_type: Some(node_type),
                ..
            }) => node_type.clone(),
            ParseletKind::Reference(target) if *target != id => self.describe(*target),
            _ => format_compact!("{id}"),
        }
    }

    /// Object kinds `rule` can produce as its value.
    #[must_use]
    pub fn result_types(&self, rule: RuleId) -> SmallVec<[CompactString; 4]> {
        let mut out = SmallVec::new();
        let mut seen = HashSet::new();
        self.collect_result_types(rule, &mut seen, &mut out);
        out
    }

    fn collect_result_types(
        &self,
        rule: RuleId,
        seen: &mut HashSet<RuleId>,
        out: &mut SmallVec<[CompactString; 4]>,
    ) {
        if !seen.insert(rule) {
            return;
        }
        let Some(parselet) = self.rule(rule) else {
            return;
        };
        match &parselet.kind {
            ParseletKind::Sequence(seq) => match (&seq.node_type, seq.pass_slot()) {
                (Some(node_type), _) => {
                    if !out.contains(node_type) {
                        out.push(node_type.clone());
                    }
                }
                (None, Some(slot)) => self.collect_result_types(slot.rule, seen, out),
                (None, None) => {}
            },
            ParseletKind::Choice(alts) => {
                for alt in alts {
                    self.collect_result_types(*alt, seen, out);
                }
            }
            ParseletKind::Indexed(choice) => {
                for alt in choice.alternatives() {
                    self.collect_result_types(*alt, seen, out);
                }
            }
            ParseletKind::Chain(chain) => {
                self.collect_result_types(chain.operand, seen, out);
                self.collect_result_types(chain.trailer, seen, out);
            }
            ParseletKind::Reference(target) => self.collect_result_types(*target, seen, out),
            ParseletKind::Literal(_)
            | ParseletKind::CharClass(_)
            | ParseletKind::Placeholder(_)
            | ParseletKind::Undefined => {}
        }
    }

    /// Swap an alternative of a choice rule in place.
    pub fn replace_alternative(
        &mut self,
        choice: RuleId,
        old: RuleId,
        new: RuleId,
    ) -> Result<(), GrammarError> {
        self.check_known(new)?;
        let replaced = match &mut self.choice_mut(choice)?.kind {
            ParseletKind::Choice(alts) => alts
                .iter_mut()
                .find(|alt| **alt == old)
                .map(|slot| *slot = new)
                .is_some(),
            ParseletKind::Indexed(indexed) => indexed.replace(old, new),
            _ => false,
        };
        if !replaced {
            tracing::error!(rule = %choice, alternative = %old, "alternative is not registered");
            return Err(GrammarError::UnregisteredAlternative {
                rule: choice,
                alternative: old,
            });
        }
        Ok(())
    }

    /// Remove an alternative of a choice rule. Later alternatives keep
    /// their relative order.
    pub fn remove_alternative(&mut self, choice: RuleId, alternative: RuleId) -> Result<(), GrammarError> {
        let removed = match &mut self.choice_mut(choice)?.kind {
            ParseletKind::Choice(alts) => match alts.iter().position(|alt| *alt == alternative) {
                Some(index) => {
                    alts.remove(index);
                    true
                }
                None => false,
            },
            ParseletKind::Indexed(indexed) => indexed.remove(alternative),
            _ => false,
        };
        if !removed {
            tracing::error!(rule = %choice, alternative = %alternative, "alternative is not registered");
            return Err(GrammarError::UnregisteredAlternative {
                rule: choice,
                alternative,
            });
        }
        Ok(())
    }

    /// Append an alternative to a plain choice, or register it under `key`
    /// in an indexed one (as a default when `key` is `None`).
    pub fn add_alternative(
        &mut self,
        choice: RuleId,
        key: Option<&'static str>,
        alternative: RuleId,
    ) -> Result<(), GrammarError> {
        self.check_known(alternative)?;
        match (&mut self.choice_mut(choice)?.kind, key) {
            (ParseletKind::Choice(alts), _) => alts.push(alternative),
            (ParseletKind::Indexed(indexed), Some(key)) => {
                indexed.add(key, alternative);
            }
            (ParseletKind::Indexed(indexed), None) => {
                indexed.add_default(alternative);
            }
            _ => return Err(GrammarError::NotAChoice { rule: choice }),
        }
        Ok(())
    }

    fn check_known(&self, rule: RuleId) -> Result<(), GrammarError> {
        if rule.index() < self.rules.len() {
            Ok(())
        } else {
            Err(GrammarError::UnknownRule { rule })
        }
    }

    fn choice_mut(&mut self, choice: RuleId) -> Result<&mut Parselet, GrammarError> {
        let parselet = self
            .rules
            .get_mut(choice.index())
            .ok_or(GrammarError::UnknownRule { rule: choice })?;
        match parselet.kind {
            ParseletKind::Choice(_) | ParseletKind::Indexed(_) => Ok(parselet),
            _ => Err(GrammarError::NotAChoice { rule: choice }),
        }
    }
}

fn rule_id(index: usize) -> RuleId {
    RuleId(u32::try_from(index).unwrap_or(u32::MAX))
}
