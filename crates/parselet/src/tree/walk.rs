//! Tree traversal.

use super::{ErrorNode, LeafNode, ParseNode, Placeholder};
use crate::text::TextSize;

/// Pre-order traversal over every node, placeholders included.
pub struct Preorder<'a> {
    stack: Vec<&'a ParseNode>,
}

impl<'a> Preorder<'a> {
    pub(crate) fn new(root: &'a ParseNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a ParseNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let mark = self.stack.len();
        self.stack.extend(node.children());
        self.stack[mark..].reverse();
        Some(node)
    }
}

/// One unit of rendered text, in document order.
#[derive(Debug, Clone, Copy)]
pub enum TextPiece<'a> {
    /// Text of a leaf
    Leaf(&'a LeafNode),
    /// Skipped text recorded by an error node (not its re-synchronised child)
    ErrorText(&'a ErrorNode),
    /// Unresolved placeholder; renders as nothing
    Placeholder(Placeholder),
}

impl TextPiece<'_> {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Leaf(leaf) => leaf.text.as_str(),
            Self::ErrorText(error) => error.text.as_str(),
            Self::Placeholder(_) => "",
        }
    }

    /// Start offset of the piece, placeholders report zero.
    #[must_use]
    pub fn start(&self) -> TextSize {
        match self {
            Self::Leaf(leaf) => leaf.header.start,
            Self::ErrorText(error) => error.header.start,
            Self::Placeholder(_) => TextSize::default(),
        }
    }
}

/// Iterator over the [`TextPiece`]s of a tree.
pub struct TextPieces<'a> {
    nodes: Preorder<'a>,
}

impl<'a> TextPieces<'a> {
    pub(crate) fn new(root: &'a ParseNode) -> Self {
        Self {
            nodes: Preorder::new(root),
        }
    }
}

impl<'a> Iterator for TextPieces<'a> {
    type Item = TextPiece<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // Error text precedes the error node's child, so visiting the error
        // node itself in pre-order yields the right order.
        self.nodes.find_map(|node| match node {
            ParseNode::Leaf(leaf) => Some(TextPiece::Leaf(leaf)),
            ParseNode::Error(error) => Some(TextPiece::ErrorText(error)),
            ParseNode::Format(kind) => Some(TextPiece::Placeholder(*kind)),
            ParseNode::Branch(_) | ParseNode::Partial(_) => None,
        })
    }
}

impl ParseNode {
    /// Pre-order traversal starting at this node.
    #[must_use]
    pub fn walk(&self) -> Preorder<'_> {
        Preorder::new(self)
    }

    /// Rendered text pieces in document order.
    #[must_use]
    pub fn text_pieces(&self) -> TextPieces<'_> {
        TextPieces::new(self)
    }

    /// Leaves in document order.
    pub fn leaves(&self) -> impl Iterator<Item = &LeafNode> {
        self.walk().filter_map(ParseNode::as_leaf)
    }

    /// Slot path from this node to the node with `id`.
    ///
    /// Each step indexes [`ParseNode::slots`]; the re-synchronised child of
    /// an error node is step `0`.
    #[must_use]
    pub fn path_to(&self, id: super::NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        self.path_to_inner(id, &mut path).then_some(path)
    }

    fn path_to_inner(&self, id: super::NodeId, path: &mut Vec<usize>) -> bool {
        if self.id() == Some(id) {
            return true;
        }
        match self {
            Self::Branch(branch) | Self::Partial(branch) => {
                for (index, child) in branch.children.iter().enumerate() {
                    let Some(child) = child else { continue };
                    path.push(index);
                    if child.path_to_inner(id, path) {
                        return true;
                    }
                    path.pop();
                }
                false
            }
            Self::Error(error) => {
                let Some(child) = error.value.as_deref() else {
                    return false;
                };
                path.push(0);
                if child.path_to_inner(id, path) {
                    return true;
                }
                path.pop();
                false
            }
            Self::Leaf(_) | Self::Format(_) => false,
        }
    }

    /// Follow a slot path.
    #[must_use]
    pub fn node_at_path(&self, path: &[usize]) -> Option<&Self> {
        let Some((&first, rest)) = path.split_first() else {
            return Some(self);
        };
        let child = match self {
            Self::Branch(branch) | Self::Partial(branch) => branch.children.get(first)?.as_ref()?,
            Self::Error(error) if first == 0 => error.value.as_deref()?,
            _ => return None,
        };
        child.node_at_path(rest)
    }

    pub(crate) fn node_at_path_mut(&mut self, path: &[usize]) -> Option<&mut Self> {
        let Some((&first, rest)) = path.split_first() else {
            return Some(self);
        };
        let child = match self {
            Self::Branch(branch) | Self::Partial(branch) => {
                branch.children.get_mut(first)?.as_mut()?
            }
            Self::Error(error) if first == 0 => error.value.as_deref_mut()?,
            _ => return None,
        };
        child.node_at_path_mut(rest)
    }

    /// Swap the node at `path` for `node`, returning the old one.
    ///
    /// Offsets are not re-threaded; callers follow up with
    /// [`ParseNode::reset_start_index`].
    pub fn replace_at_path(&mut self, path: &[usize], node: Self) -> Option<Self> {
        let target = self.node_at_path_mut(path)?;
        Some(std::mem::replace(target, node))
    }

    /// Ancestors of the node at `path`, outermost first, ending with the
    /// node itself.
    #[must_use]
    pub fn ancestors_at_path(&self, path: &[usize]) -> Vec<&Self> {
        let mut chain = vec![self];
        let mut current = self;
        for depth in 0..path.len() {
            match current.node_at_path(&path[depth..=depth]) {
                Some(next) => {
                    chain.push(next);
                    current = next;
                }
                None => break,
            }
        }
        chain
    }
}
