use super::{
    CharSet, Grammar, IndexedChoice, Literal, Parselet, ParseletKind, RuleId, Slot, rule_id, validate,
};
use crate::error::GrammarError;
use crate::intern::{InternedStr, Interner};
use compact_str::CompactString;
use hashbrown::HashMap;
use std::sync::Arc;

/// Assembles a [`Grammar`].
///
/// Rules are added anonymously with [`add`](Self::add) or by name with
/// [`rule`](Self::rule). [`declare`](Self::declare) reserves a named rule
/// for forward references; it must be [`define`](Self::define)d before
/// [`build`](Self::build).
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    rules: Vec<Parselet>,
    names: Interner,
    by_name: HashMap<InternedStr, RuleId, ahash::RandomState>,
    entry: Option<RuleId>,
    errors: Vec<GrammarError>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing grammar, keeping its rule ids, names and
    /// entry. Rules can then be redefined or added to derive a dialect.
    #[must_use]
    pub fn extend(base: &Grammar) -> Self {
        let names = base.names.thaw();
        let by_name = base
            .by_name
            .iter()
            .filter_map(|(key, rule)| {
                let name = base.names.try_resolve(*key)?;
                Some((names.get(name)?, *rule))
            })
            .collect();
        Self {
            rules: base.rules.clone(),
            names,
            by_name,
            entry: Some(base.entry),
            errors: Vec::new(),
        }
    }

    /// Reserve a named rule, or return the existing one with that name.
    pub fn declare(&mut self, name: &str) -> RuleId {
        let key = self.names.intern(name);
        if let Some(existing) = self.by_name.get(&key) {
            return *existing;
        }
        let id = self.push(Parselet::new(ParseletKind::Undefined));
        self.rules[id.index()].name = Some(CompactString::from(name));
        self.by_name.insert(key, id);
        id
    }

    /// Add an anonymous rule.
    pub fn add(&mut self, parselet: Parselet) -> RuleId {
        self.push(parselet)
    }

    /// Add a named rule. Naming a rule twice is an error unless the first
    /// use was a [`declare`](Self::declare).
    pub fn rule(&mut self, name: &str, parselet: Parselet) -> RuleId {
        let id = self.declare(name);
        if !matches!(self.rules[id.index()].kind, ParseletKind::Undefined) {
            self.errors.push(GrammarError::DuplicateName { name: name.into() });
        }
        self.define(id, parselet);
        id
    }

    /// Give a declared rule its definition, or replace an existing one.
    /// The rule keeps its name.
    pub fn define(&mut self, id: RuleId, parselet: Parselet) -> &mut Self {
        match self.rules.get_mut(id.index()) {
            Some(slot) => {
                let name = slot.name.take();
                *slot = parselet;
                if name.is_some() {
                    slot.name = name;
                }
            }
            None => self.errors.push(GrammarError::UnknownRule { rule: id }),
        }
        self
    }

    pub fn literal(&mut self, text: &'static str) -> RuleId {
        self.add(Parselet::literal(text))
    }

    pub fn keyword(&mut self, text: &'static str) -> RuleId {
        self.add(Parselet::literal_with(Literal::keyword(text)))
    }

    pub fn char_class(&mut self, set: CharSet) -> RuleId {
        self.add(Parselet::char_class(set))
    }

    pub fn sequence(&mut self, node_type: &str, slots: impl IntoIterator<Item = Slot>) -> RuleId {
        self.add(Parselet::sequence(node_type, slots))
    }

    pub fn choice(&mut self, alternatives: impl IntoIterator<Item = RuleId>) -> RuleId {
        self.add(Parselet::choice(alternatives))
    }

    pub fn indexed(&mut self, choice: IndexedChoice) -> RuleId {
        self.add(Parselet::indexed(choice))
    }

    pub fn chain(&mut self, operand: RuleId, trailer: RuleId, property: &str) -> RuleId {
        self.add(Parselet::chain(operand, trailer, property))
    }

    pub fn space(&mut self) -> RuleId {
        self.add(Parselet::space())
    }

    pub fn newline(&mut self) -> RuleId {
        self.add(Parselet::newline())
    }

    pub fn entry(&mut self, id: RuleId) -> &mut Self {
        self.entry = Some(id);
        self
    }

    #[must_use]
    pub fn rule_by_name(&self, name: &str) -> Option<RuleId> {
        self.names.get(name).and_then(|key| self.by_name.get(&key).copied())
    }

    pub fn rule_mut(&mut self, id: RuleId) -> Option<&mut Parselet> {
        self.rules.get_mut(id.index())
    }

    fn push(&mut self, parselet: Parselet) -> RuleId {
        let id = rule_id(self.rules.len());
        self.rules.push(parselet);
        id
    }

    /// Validate and freeze the grammar.
    pub fn build(mut self) -> Result<Grammar, GrammarError> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        let entry = self.entry.ok_or(GrammarError::NoEntry)?;
        if entry.index() >= self.rules.len() {
            return Err(GrammarError::UnknownRule { rule: entry });
        }
        let grammar = Grammar {
            rules: self.rules,
            names: Arc::new(self.names.freeze()),
            by_name: self.by_name,
            entry,
        };
        validate::check(&grammar)?;
        tracing::debug!(rules = grammar.len(), entry = %entry, "grammar built");
        Ok(grammar)
    }
}
