//! Editable list fields and the form that owns them.
//!
//! Structural edits (insert, delete, duplicate, reorder) lock the affected
//! items until the enclosing save settles. While locked, a fresh authoritative
//! value is held back instead of rebuilding the items.

pub mod form;
pub mod kinds;
pub mod list_field;
pub mod list_item;

use std::fmt;
use uuid::Uuid;

pub use form::EditorForm;
pub use kinds::ListKind;
pub use list_field::ListField;
pub use list_item::ListItem;

/// Correlates one lock cycle with the settle signal that releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockToken(Uuid);

impl LockToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock-{}", self.0)
    }
}

/// Stable item identity; survives reorders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}
