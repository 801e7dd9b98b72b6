//! # Semantic Values
//!
//! The dense AST that parsing produces and generation consumes.
//!
//! Values live in an arena, the [`SemanticTree`], and refer to each other by
//! [`ValueId`]. Parse nodes point at values by id, and the arena keeps the
//! reverse link (the single owning [`NodeId`] of each value) as a lookup
//! table, so neither tree holds a reference into the other.
//!
//! ```rust
//! use parselet::value::{SemanticTree, Value};
//!
//! let mut values = SemanticTree::new();
//! let name = values.text("x");
//! let stmt = values.object("Stmt");
//! values.set_field(stmt, "name", Some(name)).unwrap();
//! assert_eq!(values.render(stmt), "Stmt { name: \"x\" }");
//! assert!(values.is_dirty(stmt));
//! ```

mod accessor;

pub use accessor::{FieldAccessor, PropertyAccessor};

use crate::error::ValueError;
use crate::text::StringToken;
use crate::tree::NodeId;
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::fmt::{self, Write};

/// Handle of a value in a [`SemanticTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueId(u32);

impl ValueId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A node of the semantic tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Text(StringToken),
    List(Vec<ValueId>),
    Object(Object),
}

/// A typed record with ordered, named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Object {
    kind: CompactString,
    fields: SmallVec<[(CompactString, ValueId); 4]>,
}

impl Object {
    #[must_use]
    pub fn new(kind: impl Into<CompactString>) -> Self {
        Self {
            kind: kind.into(),
            fields: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<ValueId> {
        self.fields
            .iter()
            .find_map(|(name, value)| (name == key).then_some(*value))
    }

    /// Set or clear a field, keeping the original field order.
    pub fn set(&mut self, key: &str, value: Option<ValueId>) {
        let position = self.fields.iter().position(|(name, _)| name == key);
        match (position, value) {
            (Some(index), Some(value)) => self.fields[index].1 = value,
            (Some(index), None) => {
                self.fields.remove(index);
            }
            (None, Some(value)) => self.fields.push((key.into(), value)),
            (None, None) => {}
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, ValueId)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    owner: Option<NodeId>,
    dirty: bool,
    /// Allocated by the parser rather than through the editing API
    parsed: bool,
}

/// Arena of semantic values with ownership and dirty tracking.
///
/// Values created by parsing start clean; every mutation through the
/// editing API marks the touched value dirty. Generation reuses the parse
/// nodes of values that are clean all the way down.
///
/// Parsed values nothing refers to any more can be released with
/// [`reclaim_unreachable`](Self::reclaim_unreachable); their ids are then
/// reused by later allocations.
#[derive(Debug, Clone, Default)]
pub struct SemanticTree {
    slots: Vec<Option<Slot>>,
    free: Vec<ValueId>,
}

impl SemanticTree {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocate a value. Fresh values are dirty: no parse node backs them.
    pub fn alloc(&mut self, value: Value) -> ValueId {
        self.push_slot(value, false)
    }

    pub(crate) fn alloc_parsed(&mut self, value: Value) -> ValueId {
        self.push_slot(value, true)
    }

    fn push_slot(&mut self, value: Value, parsed: bool) -> ValueId {
        let slot = Slot {
            value,
            owner: None,
            dirty: !parsed,
            parsed,
        };
        if let Some(id) = self.free.pop()
            && let Some(entry) = self.slots.get_mut(id.index())
        {
            *entry = Some(slot);
            return id;
        }
        let id = ValueId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        self.slots.push(Some(slot));
        id
    }

    fn slot(&self, id: ValueId) -> Option<&Slot> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn live_mut(&mut self, id: ValueId) -> Option<&mut Slot> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Release every parsed value that cannot be reached from `roots` or
    /// from a value allocated through the editing API. Returns how many
    /// were released. Ids of released values become unknown until a later
    /// allocation reuses them.
    pub fn reclaim_unreachable(&mut self, roots: impl IntoIterator<Item = ValueId>) -> usize {
        let mut stack: Vec<ValueId> = roots.into_iter().collect();
        stack.extend(self.ids().filter(|id| self.slot(*id).is_some_and(|slot| !slot.parsed)));
        let mut reachable = hashbrown::HashSet::new();
        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                stack.extend(self.children(id));
            }
        }
        let mut released = 0;
        for (index, entry) in self.slots.iter_mut().enumerate() {
            let id = ValueId(u32::try_from(index).unwrap_or(u32::MAX));
            if entry.as_ref().is_some_and(|slot| slot.parsed) && !reachable.contains(&id) {
                *entry = None;
                self.free.push(id);
                released += 1;
            }
        }
        if released > 0 {
            tracing::debug!(released, live = self.len(), "released unreachable values");
        }
        released
    }

    /// Ids of every live value.
    pub fn ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_some())
            .map(|(index, _)| ValueId(u32::try_from(index).unwrap_or(u32::MAX)))
    }

    pub fn text(&mut self, text: impl Into<StringToken>) -> ValueId {
        self.alloc(Value::Text(text.into()))
    }

    pub fn list(&mut self, items: Vec<ValueId>) -> ValueId {
        self.alloc(Value::List(items))
    }

    pub fn object(&mut self, kind: impl Into<CompactString>) -> ValueId {
        self.alloc(Value::Object(Object::new(kind)))
    }

    #[must_use]
    pub fn get(&self, id: ValueId) -> Option<&Value> {
        self.slot(id).map(|slot| &slot.value)
    }

    fn slot_mut(&mut self, id: ValueId) -> Result<&mut Slot, ValueError> {
        self.live_mut(id).ok_or(ValueError::Unknown { value: id })
    }

    #[must_use]
    pub fn as_text(&self, id: ValueId) -> Option<&StringToken> {
        match self.get(id)? {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self, id: ValueId) -> Option<&Object> {
        match self.get(id)? {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn elements(&self, id: ValueId) -> Option<&[ValueId]> {
        match self.get(id)? {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Type name of an object value.
    #[must_use]
    pub fn kind(&self, id: ValueId) -> Option<&str> {
        self.as_object(id).map(Object::kind)
    }

    #[must_use]
    pub fn field(&self, object: ValueId, key: &str) -> Option<ValueId> {
        self.as_object(object)?.get(key)
    }

    pub fn set_field(
        &mut self,
        object: ValueId,
        key: &str,
        value: Option<ValueId>,
    ) -> Result<(), ValueError> {
        let slot = self.slot_mut(object)?;
        let Value::Object(record) = &mut slot.value else {
            return Err(ValueError::NotAnObject { value: object });
        };
        record.set(key, value);
        slot.dirty = true;
        Ok(())
    }

    /// Set a field while a value is being built by the parser; the value
    /// stays clean.
    pub(crate) fn init_field(&mut self, object: ValueId, key: &str, value: ValueId) {
        if let Some(Slot {
            value: Value::Object(record),
            ..
        }) = self.live_mut(object)
        {
            record.set(key, Some(value));
        }
    }

    pub fn push(&mut self, list: ValueId, item: ValueId) -> Result<(), ValueError> {
        let slot = self.slot_mut(list)?;
        let Value::List(items) = &mut slot.value else {
            return Err(ValueError::NotAList { value: list });
        };
        items.push(item);
        slot.dirty = true;
        Ok(())
    }

    pub fn remove_element(&mut self, list: ValueId, index: usize) -> Result<ValueId, ValueError> {
        let slot = self.slot_mut(list)?;
        let Value::List(items) = &mut slot.value else {
            return Err(ValueError::NotAList { value: list });
        };
        if index >= items.len() {
            return Err(ValueError::IndexOutOfBounds {
                value: list,
                index,
                len: items.len(),
            });
        }
        let removed = items.remove(index);
        slot.dirty = true;
        Ok(removed)
    }

    pub fn set_text(&mut self, id: ValueId, text: impl Into<StringToken>) -> Result<(), ValueError> {
        let slot = self.slot_mut(id)?;
        let Value::Text(current) = &mut slot.value else {
            return Err(ValueError::NotText { value: id });
        };
        *current = text.into();
        slot.dirty = true;
        Ok(())
    }

    /// The parse node that owns `id`, if any.
    #[must_use]
    pub fn owner(&self, id: ValueId) -> Option<NodeId> {
        self.slot(id).and_then(|slot| slot.owner)
    }

    pub fn set_owner(&mut self, id: ValueId, node: Option<NodeId>) {
        if let Some(slot) = self.live_mut(id) {
            slot.owner = node;
        }
    }

    #[must_use]
    pub fn is_dirty(&self, id: ValueId) -> bool {
        self.slot(id).is_none_or(|slot| slot.dirty)
    }

    /// Whether `id` and everything reachable from it is clean and owned by
    /// a parse node.
    #[must_use]
    pub fn is_clean_deep(&self, id: ValueId) -> bool {
        let mut memo = HashMap::new();
        self.clean_deep(id, &mut memo)
    }

    fn clean_deep(&self, id: ValueId, memo: &mut HashMap<ValueId, bool>) -> bool {
        if let Some(known) = memo.get(&id) {
            return *known;
        }
        // Cycles are not expected; treat a revisit as dirty.
        memo.insert(id, false);
        let Some(slot) = self.slot(id) else {
            return false;
        };
        let clean = !slot.dirty
            && slot.owner.is_some()
            && self.children(id).all(|child| self.clean_deep(child, memo));
        memo.insert(id, clean);
        clean
    }

    /// Mark `id` and everything reachable from it clean.
    pub fn mark_clean_deep(&mut self, id: ValueId) {
        let mut stack = vec![id];
        let mut seen = hashbrown::HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(slot) = self.live_mut(current) {
                slot.dirty = false;
            }
            stack.extend(self.children(current));
        }
    }

    /// Values directly referenced by `id`.
    pub fn children(&self, id: ValueId) -> impl Iterator<Item = ValueId> + '_ {
        const NONE: &[ValueId] = &[];
        let (items, fields) = match self.get(id) {
            Some(Value::List(items)) => (items.as_slice(), None),
            Some(Value::Object(object)) => (NONE, Some(object)),
            _ => (NONE, None),
        };
        items
            .iter()
            .copied()
            .chain(fields.into_iter().flat_map(|object| object.fields().map(|(_, v)| v)))
    }

    /// Overwrite `target` with the content and owner of `source`, keeping
    /// `target`'s identity so references to it stay valid.
    pub fn replace_in_place(&mut self, target: ValueId, source: ValueId) -> Result<(), ValueError> {
        if target == source {
            return Ok(());
        }
        let Some(slot) = self.slot(source) else {
            return Err(ValueError::Unknown { value: source });
        };
        let (value, owner, dirty) = (slot.value.clone(), slot.owner, slot.dirty);
        let destination = self.slot_mut(target)?;
        destination.value = value;
        destination.owner = owner;
        destination.dirty = dirty;
        Ok(())
    }

    /// Compare two values structurally, possibly across two arenas.
    /// Owners and dirty flags are ignored.
    #[must_use]
    pub fn structurally_equal(&self, a: ValueId, other: &Self, b: ValueId) -> bool {
        match (self.get(a), other.get(b)) {
            (Some(Value::Text(x)), Some(Value::Text(y))) => x == y,
            (Some(Value::List(xs)), Some(Value::List(ys))) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys)
                        .all(|(x, y)| self.structurally_equal(*x, other, *y))
            }
            (Some(Value::Object(x)), Some(Value::Object(y))) => {
                x.kind == y.kind
                    && x.fields.len() == y.fields.len()
                    && x.fields().all(|(key, xv)| {
                        y.get(key)
                            .is_some_and(|yv| self.structurally_equal(xv, other, yv))
                    })
            }
            _ => false,
        }
    }

    /// Compact single-line rendering, handy in assertions and logs.
    #[must_use]
    pub fn render(&self, id: ValueId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out, 0);
        out
    }

    fn render_into(&self, id: ValueId, out: &mut String, depth: usize) {
        if depth > 64 {
            out.push_str("...");
            return;
        }
        match self.get(id) {
            None => out.push_str("<unknown>"),
            Some(Value::Text(text)) => {
                let _ = write!(out, "{:?}", text.as_str());
            }
            Some(Value::List(items)) => {
                out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(*item, out, depth + 1);
                }
                out.push(']');
            }
            Some(Value::Object(object)) => {
                out.push_str(&object.kind);
                if object.fields.is_empty() {
                    return;
                }
                out.push_str(" { ");
                for (index, (key, value)) in object.fields().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{key}: ");
                    self.render_into(value, out, depth + 1);
                }
                out.push_str(" }");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(values: &mut SemanticTree, name: &str) -> ValueId {
        let text = values.text(StringToken::owned(name));
        let stmt = values.object("Stmt");
        values.set_field(stmt, "name", Some(text)).unwrap();
        stmt
    }

    #[test]
    fn editing_marks_values_dirty() {
        let mut values = SemanticTree::new();
        let parsed = values.alloc_parsed(Value::List(Vec::new()));
        assert!(!values.is_dirty(parsed));
        let item = stmt(&mut values, "x");
        values.push(parsed, item).unwrap();
        assert!(values.is_dirty(parsed));
        values.mark_clean_deep(parsed);
        assert!(!values.is_dirty(item));
    }

    #[test]
    fn clean_deep_requires_owners_all_the_way_down() {
        let mut values = SemanticTree::new();
        let leaf = values.alloc_parsed(Value::Text("a".into()));
        let list = values.alloc_parsed(Value::List(vec![leaf]));
        let mut ids = crate::tree::NodeIds::new();
        values.set_owner(list, Some(ids.next_id()));
        assert!(!values.is_clean_deep(list));
        values.set_owner(leaf, Some(ids.next_id()));
        assert!(values.is_clean_deep(list));
        values.set_text(leaf, "b").unwrap();
        assert!(!values.is_clean_deep(list));
    }

    #[test]
    fn field_order_survives_updates_and_removal() {
        let mut values = SemanticTree::new();
        let obj = values.object("Pair");
        let a = values.text("a");
        let b = values.text("b");
        values.set_field(obj, "left", Some(a)).unwrap();
        values.set_field(obj, "right", Some(b)).unwrap();
        values.set_field(obj, "left", Some(b)).unwrap();
        assert_eq!(values.render(obj), "Pair { left: \"b\", right: \"b\" }");
        values.set_field(obj, "left", None).unwrap();
        assert_eq!(values.field(obj, "left"), None);
        assert!(matches!(
            values.set_field(a, "x", None),
            Err(ValueError::NotAnObject { .. })
        ));
    }

    #[test]
    fn structural_equality_spans_arenas() {
        let mut left = SemanticTree::new();
        let mut right = SemanticTree::new();
        let _padding = right.text("unused");
        let x = stmt(&mut left, "x");
        let y = stmt(&mut right, "x");
        assert!(left.structurally_equal(x, &right, y));
        let z = stmt(&mut right, "z");
        assert!(!left.structurally_equal(x, &right, z));
    }

    #[test]
    fn unreachable_parsed_values_are_released_and_reused() {
        let mut values = SemanticTree::new();
        let kept = values.alloc_parsed(Value::Text("kept".into()));
        let root = values.alloc_parsed(Value::List(vec![kept]));
        let dropped = values.alloc_parsed(Value::Text("dropped".into()));
        let edited = values.text("user");
        let referenced = values.alloc_parsed(Value::Text("held".into()));
        let holder = values.list(vec![referenced]);
        assert_eq!(values.len(), 6);

        assert_eq!(values.reclaim_unreachable([root]), 1);
        assert_eq!(values.len(), 5);
        assert_eq!(values.get(dropped), None);
        assert_eq!(values.render(root), "[\"kept\"]");
        assert_eq!(values.render(holder), "[\"held\"]");
        assert!(values.get(edited).is_some());

        let reused = values.text("again");
        assert_eq!(reused, dropped);
        assert_eq!(values.len(), 6);
        assert!(matches!(values.set_text(dropped, "x"), Ok(())));
    }

    #[test]
    fn replace_in_place_keeps_identity() {
        let mut values = SemanticTree::new();
        let old = stmt(&mut values, "old");
        let parent = values.list(vec![old]);
        let new = stmt(&mut values, "new");
        values.replace_in_place(old, new).unwrap();
        assert_eq!(values.render(parent), "[Stmt { name: \"new\" }]");
    }
}
