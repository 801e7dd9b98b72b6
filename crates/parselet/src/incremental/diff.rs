//! Locating the changed region between a parsed tree and new text.

use crate::error::DiffError;
use crate::text::{TextRange, TextSize, common_prefix_len, common_suffix_len, size_of};
use crate::tree::{NodeId, ParseNode};
use hashbrown::HashSet;

/// Where an old tree and a new text stop agreeing.
///
/// The old interval `[prefix, old_end)` is the smallest stretch of the old
/// text that has to change to produce the new text; the new interval
/// `[prefix, new_end)` is what replaces it. Error nodes are not trusted to
/// agree with anything: the common prefix stops at the first one and the
/// common suffix at the last, so recovered regions are always reparsed.
#[derive(Debug, Clone)]
pub struct DiffContext {
    prefix: TextSize,
    old_end: TextSize,
    new_end: TextSize,
    old_len: TextSize,
    new_len: TextSize,
    identical: bool,
    first: Option<NodeId>,
    last: Option<NodeId>,
    changed: HashSet<NodeId, ahash::RandomState>,
}

impl DiffContext {
    /// Compare `old_root`'s text with `new_text`.
    ///
    /// Trees that still hold formatting placeholders have no text to
    /// compare and are rejected.
    pub fn compute(old_root: &ParseNode, new_text: &str) -> Result<Self, DiffError> {
        if old_root.is_generated_tree() {
            tracing::error!("diff requested on a tree with unresolved formatting");
            return Err(DiffError::UnresolvedFormatting);
        }
        let old_text = old_root.text();
        let old_len = size_of(old_text.len());
        let new_len = size_of(new_text.len());
        if old_text == new_text {
            return Ok(Self {
                prefix: old_len,
                old_end: old_len,
                new_end: new_len,
                old_len,
                new_len,
                identical: true,
                first: None,
                last: None,
                changed: HashSet::default(),
            });
        }

        let mut prefix = common_prefix_len(&old_text, new_text);
        let suffix = common_suffix_len(&old_text[prefix..], &new_text[prefix..]);
        let mut old_end = old_text.len() - suffix;
        for node in old_root.walk() {
            if let ParseNode::Error(_) = node {
                let range = node.range();
                prefix = prefix.min(u32::from(range.start()) as usize);
                old_end = old_end.max(u32::from(range.end()) as usize);
            }
        }
        let suffix = old_text.len() - old_end;
        let new_end = new_text.len() - suffix;

        let prefix = size_of(prefix);
        let old_end = size_of(old_end);
        let first = old_root
            .find_node_at(prefix, None, false)
            .or_else(|| old_root.find_node_at(prefix, None, true))
            .and_then(ParseNode::id);
        let last = if old_end > prefix {
            old_root
                .find_node_at(old_end - TextSize::from(1), None, false)
                .and_then(ParseNode::id)
        } else {
            first
        };
        let interval = TextRange::new(prefix, old_end);
        let changed = old_root
            .walk()
            .filter(|node| !node.is_placeholder() && overlaps(node.range(), interval))
            .filter_map(ParseNode::id)
            .collect();
        Ok(Self {
            prefix,
            old_end,
            new_end: size_of(new_end),
            old_len,
            new_len,
            identical: false,
            first,
            last,
            changed,
        })
    }

    /// The texts are equal; nothing needs reparsing.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        self.identical
    }

    #[must_use]
    pub fn old_range(&self) -> TextRange {
        TextRange::new(self.prefix, self.old_end)
    }

    #[must_use]
    pub fn new_range(&self) -> TextRange {
        TextRange::new(self.prefix, self.new_end)
    }

    /// New length minus old length.
    #[must_use]
    pub fn delta(&self) -> i64 {
        i64::from(u32::from(self.new_len)) - i64::from(u32::from(self.old_len))
    }

    /// Deepest old node at the first point of divergence.
    #[must_use]
    pub const fn first_diverging(&self) -> Option<NodeId> {
        self.first
    }

    /// Deepest old node at the last point of divergence.
    #[must_use]
    pub const fn last_diverging(&self) -> Option<NodeId> {
        self.last
    }

    /// Whether the old node `id` overlaps the changed interval.
    #[must_use]
    pub fn is_changed(&self, id: NodeId) -> bool {
        self.changed.contains(&id)
    }

    pub fn changed(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.changed.iter().copied()
    }

    #[must_use]
    pub fn changed_len(&self) -> usize {
        self.changed.len()
    }

    /// Where an old offset at or after the end of the changed interval
    /// lands in the new text.
    #[must_use]
    pub fn shift(&self, offset: TextSize) -> TextSize {
        if offset < self.old_end {
            return offset;
        }
        offset - self.old_end + self.new_end
    }
}

/// Overlap with the changed interval. An empty interval is a pure
/// insertion, which touches the nodes on both sides of it.
pub(crate) fn overlaps(node: TextRange, interval: TextRange) -> bool {
    if interval.is_empty() {
        node.start() <= interval.start() && interval.start() <= node.end()
    } else {
        node.start() < interval.end() && interval.start() < node.end()
    }
}
