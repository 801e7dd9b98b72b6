//! Keyed choice with a one-peek candidate lookup.

use super::RuleId;
use super::literal::LiteralSet;
use crate::text::StringToken;
use hashbrown::HashMap;
use smallvec::SmallVec;

type Positions = SmallVec<[usize; 4]>;

/// An ordered choice whose alternatives are registered under literal keys.
///
/// Instead of trying every alternative in turn, the parser peeks at the
/// input, collects the alternatives registered under keys the input starts
/// with plus the default alternatives, and tries only those, still in
/// registration order. As long as every alternative registered under a key
/// can only match input that starts with that key, possibly after leading
/// whitespace, the outcome is identical to a plain ordered choice over the
/// same alternatives.
#[derive(Debug, Clone, Default)]
pub struct IndexedChoice {
    alternatives: Vec<RuleId>,
    keyed: HashMap<StringToken, Positions, ahash::RandomState>,
    defaults: Positions,
    keys: LiteralSet,
}

impl IndexedChoice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rule` under `key`. A rule may be registered under several
    /// keys; it still occupies a single position in the order.
    pub fn add(&mut self, key: impl Into<StringToken>, rule: RuleId) -> &mut Self {
        let key = key.into();
        let position = self.position_or_push(rule);
        let slot = self.keyed.entry(key.clone()).or_default();
        if !slot.contains(&position) {
            slot.push(position);
        }
        self.keys.insert(key);
        self
    }

    /// Register `rule` as an alternative tried for every input.
    pub fn add_default(&mut self, rule: RuleId) -> &mut Self {
        let position = self.position_or_push(rule);
        if !self.defaults.contains(&position) {
            self.defaults.push(position);
        }
        self
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<StringToken>, rule: RuleId) -> Self {
        self.add(key, rule);
        self
    }

    #[must_use]
    pub fn with_default(mut self, rule: RuleId) -> Self {
        self.add_default(rule);
        self
    }

    fn position_or_push(&mut self, rule: RuleId) -> usize {
        if let Some(position) = self.alternatives.iter().position(|alt| *alt == rule) {
            return position;
        }
        self.alternatives.push(rule);
        self.alternatives.len() - 1
    }

    /// Every alternative in registration order.
    #[must_use]
    pub fn alternatives(&self) -> &[RuleId] {
        &self.alternatives
    }

    #[must_use]
    pub fn contains(&self, rule: RuleId) -> bool {
        self.alternatives.contains(&rule)
    }

    /// Swap `old` for `new`, keeping its position and keys.
    pub fn replace(&mut self, old: RuleId, new: RuleId) -> bool {
        match self.alternatives.iter_mut().find(|alt| **alt == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    /// Remove `rule` and re-index the alternatives after it.
    pub fn remove(&mut self, rule: RuleId) -> bool {
        let Some(removed) = self.alternatives.iter().position(|alt| *alt == rule) else {
            return false;
        };
        self.alternatives.remove(removed);
        let reindex = |positions: &mut Positions| {
            positions.retain(|p| *p != removed);
            for p in positions.iter_mut() {
                if *p > removed {
                    *p -= 1;
                }
            }
        };
        reindex(&mut self.defaults);
        self.keyed.values_mut().for_each(reindex);
        self.keyed.retain(|_, positions| !positions.is_empty());
        self.keys = LiteralSet::new(self.keyed.keys().cloned());
        true
    }

    /// Alternatives worth trying at `offset`, in registration order.
    ///
    /// Keys are looked up both at `offset` and after the whitespace there,
    /// so alternatives that skip leading whitespace stay reachable.
    #[must_use]
    pub fn candidates(&self, input: &str, offset: usize) -> SmallVec<[RuleId; 8]> {
        let mut positions: SmallVec<[usize; 8]> = self.defaults.iter().copied().collect();
        let skipped = after_whitespace(input, offset);
        let at_offset = self.keys.prefixes_at(input, offset);
        let after_space = self.keys.prefixes_at(input, skipped).filter(|_| skipped > offset);
        for key in at_offset.chain(after_space) {
            if let Some(found) = self.keyed.get(key) {
                positions.extend(found.iter().copied());
            }
        }
        positions.sort_unstable();
        positions.dedup();
        positions
            .into_iter()
            .filter_map(|p| self.alternatives.get(p).copied())
            .collect()
    }

    /// End of the input `candidates` looks at from `offset`.
    #[must_use]
    pub fn examined_end(&self, input: &str, offset: usize) -> usize {
        let skipped = after_whitespace(input, offset);
        self.keys
            .examined_end(input, offset)
            .max(self.keys.examined_end(input, skipped))
    }
}

fn after_whitespace(input: &str, offset: usize) -> usize {
    let rest = input.get(offset..).unwrap_or_default();
    offset + rest.len() - rest.trim_start().len()
}
