//! Editor-wide signal events.

use crate::fields::LockToken;
use crate::remote::RemoteError;

// === Rendering ===

/// State changed; the view layer should re-render. Fire-and-forget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequested;

// === Notifications ===

/// Remote failure nobody handled at the call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announcement(pub RemoteError);

// === File lifecycle ===

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLoaded {
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSaved {
    pub path: String,
}

/// Enclosing save finished; releases the listed lock cycles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationSettled {
    pub tokens: Vec<LockToken>,
}
