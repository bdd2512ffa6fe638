//! Entities module - records exchanged with the remote data source.
//!
//! All records are plain serde types; the editor core never mutates them in
//! place except through `EditorState` (active file) and `EditorForm` (lists).

pub mod file;
pub mod preview;
pub mod project;

pub use file::{EditorFile, FileEntry};
pub use preview::{PreviewConfig, PreviewRoute};
pub use project::{Device, PreviewSettings, Project, User, Workspace};
