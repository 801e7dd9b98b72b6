//! Length, text and offset operations on parse nodes.

use super::{NodeHeader, ParseNode};
use crate::error::TreeError;
use crate::grammar::RuleId;
use crate::text::{TextRange, TextSize};

impl ParseNode {
    /// Rendered length. Unresolved placeholders have length zero.
    #[must_use]
    pub fn len(&self) -> TextSize {
        match self {
            Self::Leaf(leaf) => TextSize::of(leaf.text.as_str()),
            Self::Branch(branch) | Self::Partial(branch) => branch
                .children
                .iter()
                .flatten()
                .map(Self::len)
                .sum(),
            Self::Format(_) => TextSize::default(),
            Self::Error(error) => {
                TextSize::of(error.text.as_str()) + error.value.as_deref().map_or_else(TextSize::default, Self::len)
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == TextSize::default()
    }

    #[must_use]
    pub fn end(&self) -> TextSize {
        self.start() + self.len()
    }

    #[must_use]
    pub fn range(&self) -> TextRange {
        TextRange::at(self.start(), self.len())
    }

    /// Rendered text of this node and its descendants.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(u32::from(self.len()) as usize);
        self.write_text(&mut out);
        out
    }

    pub fn write_text(&self, out: &mut String) {
        for piece in self.text_pieces() {
            out.push_str(piece.as_str());
        }
    }

    /// Character at a byte offset relative to this node's start.
    #[must_use]
    pub fn char_at(&self, offset: TextSize) -> Option<char> {
        let mut base = TextSize::default();
        for piece in self.text_pieces() {
            let text = piece.as_str();
            let len = TextSize::of(text);
            if offset < base + len {
                let local = u32::from(offset - base) as usize;
                return text.get(local..)?.chars().next();
            }
            base += len;
        }
        None
    }

    /// Text between two offsets relative to this node's start.
    #[must_use]
    pub fn substring(&self, start: TextSize, end: TextSize) -> String {
        let mut out = String::new();
        if end <= start {
            return out;
        }
        let mut base = TextSize::default();
        for piece in self.text_pieces() {
            let text = piece.as_str();
            let piece_end = base + TextSize::of(text);
            if piece_end > start && base < end {
                let from = u32::from(start.max(base) - base) as usize;
                let to = u32::from(end.min(piece_end) - base) as usize;
                out.push_str(text.get(from..to).unwrap_or_default());
            }
            if piece_end >= end {
                break;
            }
            base = piece_end;
        }
        out
    }

    /// Deepest node covering the absolute `offset`.
    ///
    /// With `rule` set, only nodes produced by that rule qualify. With
    /// `allow_overlap`, a node whose end touches `offset` also counts as
    /// covering it, so a cursor sitting right after a token finds that token.
    #[must_use]
    pub fn find_node_at(
        &self,
        offset: TextSize,
        rule: Option<RuleId>,
        allow_overlap: bool,
    ) -> Option<&Self> {
        if !self.covers(offset, allow_overlap) {
            return None;
        }
        if let Some(found) = self
            .children()
            .find_map(|child| child.find_node_at(offset, rule, allow_overlap))
        {
            return Some(found);
        }
        match rule {
            Some(rule) if self.rule() != Some(rule) => None,
            _ => Some(self),
        }
    }

    fn covers(&self, offset: TextSize, allow_overlap: bool) -> bool {
        if self.is_placeholder() {
            return false;
        }
        let range = self.range();
        range.contains(offset) || (allow_overlap && range.end() == offset)
    }

    /// Re-thread start offsets from `start` through the subtree, returning
    /// the end offset.
    ///
    /// With `provisional`, the new offsets go to the shadow field and the
    /// committed offsets are untouched. Otherwise the committed offsets are
    /// overwritten; with `validate`, any node that already carries a
    /// provisional offset must agree with the offset it is being given.
    pub fn reset_start_index(
        &mut self,
        start: TextSize,
        validate: bool,
        provisional: bool,
    ) -> Result<TextSize, TreeError> {
        if let Some(header) = self.header_mut() {
            apply_start(header, start, validate, provisional)?;
        }
        match self {
            Self::Leaf(leaf) => Ok(start + TextSize::of(leaf.text.as_str())),
            Self::Format(_) => Ok(start),
            Self::Branch(branch) | Self::Partial(branch) => {
                let mut offset = start;
                for child in branch.children.iter_mut().flatten() {
                    offset = child.reset_start_index(offset, validate, provisional)?;
                }
                Ok(offset)
            }
            Self::Error(error) => {
                let offset = start + TextSize::of(error.text.as_str());
                match error.value.as_deref_mut() {
                    Some(value) => value.reset_start_index(offset, validate, provisional),
                    None => Ok(offset),
                }
            }
        }
    }

    /// Move every provisional offset into the committed field.
    pub fn commit_provisional(&mut self) {
        self.for_each_header(&mut |header| {
            if let Some(offset) = header.provisional.take() {
                header.start = offset;
            }
        });
    }

    /// Drop provisional offsets without applying them.
    pub fn clear_provisional(&mut self) {
        self.for_each_header(&mut |header| header.provisional = None);
    }

    pub(crate) fn for_each_header(&mut self, f: &mut impl FnMut(&mut NodeHeader)) {
        if let Some(header) = self.header_mut() {
            f(header);
        }
        match self {
            Self::Branch(branch) | Self::Partial(branch) => {
                for child in branch.children.iter_mut().flatten() {
                    child.for_each_header(f);
                }
            }
            Self::Error(error) => {
                if let Some(value) = error.value.as_deref_mut() {
                    value.for_each_header(f);
                }
            }
            Self::Leaf(_) | Self::Format(_) => {}
        }
    }

    /// True if this node or any descendant is an error node.
    #[must_use]
    pub fn is_error_node(&self) -> bool {
        self.walk().any(|node| matches!(node, Self::Error(_)))
    }

    /// True if this node or any descendant was produced by generation
    /// rather than by parsing source text.
    #[must_use]
    pub fn is_generated_tree(&self) -> bool {
        self.walk().any(|node| match node.header() {
            Some(header) => header.generated,
            None => true,
        })
    }

    /// Verify the coverage invariant: each child starts where its previous
    /// sibling ends.
    pub fn check_offsets(&self) -> Result<(), TreeError> {
        let Some(header) = self.header() else {
            return Ok(());
        };
        let mut cursor = header.start;
        if let Self::Error(error) = self {
            cursor += TextSize::of(error.text.as_str());
        }
        for child in self.children() {
            if let Some(child_header) = child.header()
                && child_header.start != cursor
            {
                return Err(TreeError::InvalidStartIndex {
                    node: child_header.id,
                    expected: cursor,
                    found: child_header.start,
                });
            }
            child.check_offsets()?;
            cursor = child.start().max(cursor) + child.len();
        }
        Ok(())
    }
}

fn apply_start(
    header: &mut NodeHeader,
    start: TextSize,
    validate: bool,
    provisional: bool,
) -> Result<(), TreeError> {
    if provisional {
        header.provisional = Some(start);
        return Ok(());
    }
    if validate
        && let Some(expected) = header.provisional
        && expected != start
    {
        tracing::error!(
            node = %header.id,
            expected = u32::from(expected),
            found = u32::from(start),
            "start index disagrees with provisional offset"
        );
        return Err(TreeError::InvalidStartIndex {
            node: header.id,
            expected,
            found: start,
        });
    }
    header.start = start;
    header.provisional = None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::TreeError;
    use crate::testing::fixtures::{branch, leaf};
    use crate::text::TextSize;
    use crate::tree::{NodeIds, ParseNode, Placeholder};

    fn sample(ids: &mut NodeIds) -> ParseNode {
        // "if" "{" ( "x" ";" ) "}"
        let kw = leaf(ids, 0, "if");
        let open = leaf(ids, 2, "{");
        let x = leaf(ids, 3, "x");
        let semi = leaf(ids, 4, ";");
        let stmt = branch(ids, 3, vec![Some(x), Some(semi)]);
        let close = leaf(ids, 5, "}");
        let block = branch(ids, 2, vec![Some(open), Some(stmt), None, Some(close)]);
        branch(ids, 0, vec![Some(kw), Some(block)])
    }

    #[test]
    fn length_text_and_chars() {
        let root = sample(&mut NodeIds::new());
        assert_eq!(root.len(), TextSize::from(6));
        assert_eq!(root.text(), "if{x;}");
        assert_eq!(root.char_at(TextSize::from(3)), Some('x'));
        assert_eq!(root.char_at(TextSize::from(6)), None);
        assert_eq!(root.substring(TextSize::from(1), TextSize::from(4)), "f{x");
        assert!(root.check_offsets().is_ok());
    }

    #[test]
    fn find_node_at_prefers_the_deepest_node() {
        let root = sample(&mut NodeIds::new());
        let found = root.find_node_at(TextSize::from(3), None, false).unwrap();
        assert_eq!(found.text(), "x");
        assert!(root.find_node_at(TextSize::from(6), None, false).is_none());
        let touching = root.find_node_at(TextSize::from(6), None, true).unwrap();
        assert_eq!(touching.text(), "}");
    }

    #[test]
    fn reset_start_index_shifts_every_node() {
        let mut root = sample(&mut NodeIds::new());
        let end = root.reset_start_index(TextSize::from(10), true, false).unwrap();
        assert_eq!(end, TextSize::from(16));
        assert_eq!(root.find_node_at(TextSize::from(13), None, false).unwrap().text(), "x");
        assert!(root.check_offsets().is_ok());
    }

    #[test]
    fn provisional_offsets_commit_or_clear() {
        let mut root = sample(&mut NodeIds::new());
        root.reset_start_index(TextSize::from(4), false, true).unwrap();
        assert_eq!(root.start(), TextSize::from(0));
        let mut cleared = root.clone();
        cleared.clear_provisional();
        assert_eq!(cleared.header().unwrap().provisional(), None);
        root.commit_provisional();
        assert_eq!(root.start(), TextSize::from(4));
        assert!(root.check_offsets().is_ok());
    }

    #[test]
    fn validated_reset_rejects_disagreeing_provisional_offsets() {
        let mut root = sample(&mut NodeIds::new());
        root.reset_start_index(TextSize::from(4), false, true).unwrap();
        let err = root.reset_start_index(TextSize::from(5), true, false).unwrap_err();
        assert!(matches!(err, TreeError::InvalidStartIndex { .. }));
    }

    #[test]
    fn placeholders_mark_generated_trees() {
        let mut ids = NodeIds::new();
        let a = leaf(&mut ids, 0, "a");
        let root = branch(&mut ids, 0, vec![Some(a), Some(ParseNode::Format(Placeholder::Space))]);
        assert!(root.is_generated_tree());
        assert_eq!(root.len(), TextSize::from(1));
        assert!(!root.is_error_node());
    }
}
