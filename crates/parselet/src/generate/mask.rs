use crate::error::MaskError;
use crate::value::ValueId;
use compact_str::CompactString;

#[derive(Debug, Clone)]
struct MaskEntry {
    object: ValueId,
    key: CompactString,
    value: Option<ValueId>,
}

/// Stack of property overrides consulted before the property accessor.
///
/// Entries must be popped in the reverse order they were pushed. Each
/// [`push`](Self::push) returns a token that the matching
/// [`pop`](Self::pop) must present; anything else is a programming error.
#[derive(Debug, Clone, Default)]
pub struct MaskTable {
    entries: Vec<MaskEntry>,
}

/// Proof of one [`MaskTable::push`], redeemed by the matching pop.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pushed mask must be popped"]
pub struct MaskToken(usize);

impl MaskTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make `object.key` read as `value` until the returned token is popped.
    pub fn push(&mut self, object: ValueId, key: &str, value: Option<ValueId>) -> MaskToken {
        self.entries.push(MaskEntry {
            object,
            key: key.into(),
            value,
        });
        MaskToken(self.entries.len())
    }

    pub fn pop(&mut self, token: MaskToken) -> Result<(), MaskError> {
        if self.entries.is_empty() {
            tracing::error!(expected = token.0, "mask popped from an empty stack");
            return Err(MaskError::Empty);
        }
        if token.0 != self.entries.len() {
            tracing::error!(expected = token.0, found = self.entries.len(), "mask popped out of order");
            return Err(MaskError::Unbalanced {
                expected: token.0,
                found: self.entries.len(),
            });
        }
        self.entries.pop();
        Ok(())
    }

    /// The override for `object.key`: `Some(None)` when masked to nothing,
    /// `None` when not masked at all. The most recent entry wins.
    #[must_use]
    pub fn lookup(&self, object: ValueId, key: &str) -> Option<Option<ValueId>> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.object == object && entry.key == key)
            .map(|entry| entry.value)
    }

    /// Fails if entries were left above `depth`.
    pub fn check_depth(&self, depth: usize) -> Result<(), MaskError> {
        if self.entries.len() > depth {
            let leaked = self.entries.len() - depth;
            tracing::error!(leaked, "masks leaked out of a generation attempt");
            return Err(MaskError::Leaked { leaked });
        }
        Ok(())
    }
}
