use super::ItemId;

/// One entry of a list field.
///
/// Dirty when the value differs from the pristine copy taken at the last sync.
#[derive(Debug, Clone)]
pub struct ListItem<V> {
    id: ItemId,
    value: V,
    pristine: V,
    pub(super) is_expanded: bool,
    pub(super) is_locked: bool,
}

impl<V: Clone + PartialEq> ListItem<V> {
    pub fn new(value: V) -> Self {
        Self {
            id: ItemId::new(),
            pristine: value.clone(),
            value,
            is_expanded: false,
            is_locked: false,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn set(&mut self, value: V) {
        self.value = value;
    }

    pub fn is_dirty(&self) -> bool {
        self.value != self.pristine
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// Discard local edits
    pub fn revert(&mut self) {
        self.value = self.pristine.clone();
    }

    /// Take `value` as both current and pristine.
    pub(super) fn reset(&mut self, value: V) {
        self.pristine = value.clone();
        self.value = value;
    }
}
