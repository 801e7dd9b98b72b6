//! # Name Interning
//!
//! Rule names are interned once at grammar-definition time so lookups by
//! name are a hash of a small key instead of a string comparison chain.
//!
//! ```rust
//! use parselet::intern::Interner;
//!
//! let mut names = Interner::new();
//! let a = names.intern("expr");
//! let b = names.intern("expr");
//! assert_eq!(a, b);
//!
//! let frozen = names.freeze();
//! assert_eq!(frozen.resolve(a), "expr");
//! assert_eq!(frozen.get("expr"), Some(a));
//! ```

use lasso::{Rodeo, RodeoReader, Spur};
use std::fmt;

/// Key of an interned name.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedStr(Spur);

impl fmt::Debug for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternedStr({:?})", self.0)
    }
}

/// Growable interner used while a grammar is being built.
#[derive(Debug, Default)]
pub struct Interner {
    rodeo: Rodeo,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning the existing key if it was seen before.
    pub fn intern(&mut self, name: &str) -> InternedStr {
        InternedStr(self.rodeo.get_or_intern(name))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<InternedStr> {
        self.rodeo.get(name).map(InternedStr)
    }

    #[must_use]
    pub fn try_resolve(&self, key: InternedStr) -> Option<&str> {
        self.rodeo.try_resolve(&key.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }

    /// Stop accepting new names. The frozen table is `Sync` and can be
    /// shared by concurrent parses.
    #[must_use]
    pub fn freeze(self) -> FrozenInterner {
        FrozenInterner {
            reader: self.rodeo.into_reader(),
        }
    }
}

/// Read-only name table owned by a built grammar.
#[derive(Debug)]
pub struct FrozenInterner {
    reader: RodeoReader,
}

impl FrozenInterner {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<InternedStr> {
        self.reader.get(name).map(InternedStr)
    }

    /// Resolve a key produced by the interner this table was frozen from.
    ///
    /// # Panics
    ///
    /// Panics if the key belongs to another interner.
    #[must_use]
    pub fn resolve(&self, key: InternedStr) -> &str {
        self.reader.resolve(&key.0)
    }

    #[must_use]
    pub fn try_resolve(&self, key: InternedStr) -> Option<&str> {
        self.reader.try_resolve(&key.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reader.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// Re-open the table for a derived grammar, keeping every existing key.
    #[must_use]
    pub fn thaw(&self) -> Interner {
        let mut rodeo = Rodeo::new();
        for (_, name) in self.reader.iter() {
            rodeo.get_or_intern(name);
        }
        Interner { rodeo }
    }
}
