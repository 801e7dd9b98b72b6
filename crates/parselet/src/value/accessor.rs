use super::{SemanticTree, ValueId};
use crate::error::ValueError;

/// Reads and writes named properties of semantic values.
///
/// Generation reads every `Property` slot through this trait, after the
/// mask table has had its say. Implementations can map grammar property
/// names onto whatever shape the host's values have.
pub trait PropertyAccessor: Send + Sync {
    fn get(&self, tree: &SemanticTree, object: ValueId, key: &str) -> Option<ValueId>;

    fn set(
        &self,
        tree: &mut SemanticTree,
        object: ValueId,
        key: &str,
        value: Option<ValueId>,
    ) -> Result<(), ValueError>;

    /// Runtime type used to decide whether a value fits a typed rule.
    fn type_name<'t>(&self, tree: &'t SemanticTree, value: ValueId) -> Option<&'t str>;
}

/// Accessor over the built-in [`Object`](super::Object) fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldAccessor;

impl PropertyAccessor for FieldAccessor {
    fn get(&self, tree: &SemanticTree, object: ValueId, key: &str) -> Option<ValueId> {
        tree.field(object, key)
    }

    fn set(
        &self,
        tree: &mut SemanticTree,
        object: ValueId,
        key: &str,
        value: Option<ValueId>,
    ) -> Result<(), ValueError> {
        tree.set_field(object, key, value)
    }

    fn type_name<'t>(&self, tree: &'t SemanticTree, value: ValueId) -> Option<&'t str> {
        tree.kind(value)
    }
}
