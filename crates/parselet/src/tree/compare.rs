//! Structural copy and comparison.

use super::{NodeIds, ParseNode};
use std::fmt::Write;

impl ParseNode {
    /// Structural copy with fresh node identities.
    ///
    /// Text tokens keep sharing their buffers and placeholders are copied
    /// by value, since neither carries per-node state. Offsets and value
    /// links are preserved.
    #[must_use]
    pub fn deep_copy(&self, ids: &mut NodeIds) -> Self {
        let mut copy = self.clone();
        copy.for_each_header(&mut |header| header.id = ids.next_id());
        copy
    }

    /// Human-readable list of structural differences, empty when the two
    /// trees match. Node identities and value links are not compared.
    #[must_use]
    pub fn diff_against(&self, other: &Self) -> Vec<String> {
        let mut out = Vec::new();
        diff_nodes(self, other, "root", &mut out);
        out
    }
}

fn describe(node: &ParseNode) -> &'static str {
    match node {
        ParseNode::Leaf(_) => "leaf",
        ParseNode::Branch(_) => "branch",
        ParseNode::Format(_) => "placeholder",
        ParseNode::Error(_) => "error",
        ParseNode::Partial(_) => "partial",
    }
}

fn diff_nodes(left: &ParseNode, right: &ParseNode, path: &str, out: &mut Vec<String>) {
    if std::mem::discriminant(left) != std::mem::discriminant(right) {
        out.push(format!(
            "{path}: {} vs {}",
            describe(left),
            describe(right)
        ));
        return;
    }
    if left.rule() != right.rule() {
        out.push(format!("{path}: rule {:?} vs {:?}", left.rule(), right.rule()));
    }
    if left.start() != right.start() {
        out.push(format!(
            "{path}: start {} vs {}",
            u32::from(left.start()),
            u32::from(right.start())
        ));
    }
    match (left, right) {
        (ParseNode::Leaf(a), ParseNode::Leaf(b)) => {
            if a.text != b.text {
                out.push(format!("{path}: text {:?} vs {:?}", a.text, b.text));
            }
        }
        (ParseNode::Format(a), ParseNode::Format(b)) => {
            if a != b {
                out.push(format!("{path}: {a:?} vs {b:?}"));
            }
        }
        (ParseNode::Error(a), ParseNode::Error(b)) => {
            if a.text != b.text {
                out.push(format!("{path}: error text {:?} vs {:?}", a.text, b.text));
            }
            if a.error.code() != b.error.code() {
                out.push(format!("{path}: error {} vs {}", a.error, b.error));
            }
            match (a.value.as_deref(), b.value.as_deref()) {
                (Some(x), Some(y)) => diff_nodes(x, y, &format!("{path}/0"), out),
                (None, None) => {}
                (x, y) => out.push(format!(
                    "{path}: resynced node {} vs {}",
                    presence(x),
                    presence(y)
                )),
            }
        }
        (ParseNode::Branch(a), ParseNode::Branch(b))
        | (ParseNode::Partial(a), ParseNode::Partial(b)) => {
            if a.children.len() != b.children.len() {
                out.push(format!(
                    "{path}: {} slots vs {}",
                    a.children.len(),
                    b.children.len()
                ));
            }
            for (index, (x, y)) in a.children.iter().zip(&b.children).enumerate() {
                let mut child_path = String::with_capacity(path.len() + 4);
                let _ = write!(child_path, "{path}/{index}");
                match (x, y) {
                    (Some(x), Some(y)) => diff_nodes(x, y, &child_path, out),
                    (None, None) => {}
                    (x, y) => out.push(format!(
                        "{child_path}: {} vs {}",
                        presence(x.as_ref()),
                        presence(y.as_ref())
                    )),
                }
            }
        }
        _ => {}
    }
}

fn presence(node: Option<&ParseNode>) -> &'static str {
    node.map_or("empty", describe)
}
