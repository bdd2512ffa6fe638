//! Project-level records: project, workspaces, users, preview devices.

use serde::{Deserialize, Serialize};

/// Top-level site/project the editor is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Preview target. `None` = project has no preview, URL resolution stops.
    #[serde(default)]
    pub preview: Option<PreviewSettings>,
}

/// Settings passed to the remote when fetching the preview routing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSettings {
    /// Preview host / deployment target name
    pub target: String,
    /// Static site generator hint (hugo, jekyll, ...)
    #[serde(default)]
    pub generator: Option<String>,
}

/// Workspace (branch) content is edited in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub branch: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Workspace {
    pub fn new(name: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branch: branch.into(),
            is_default: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Preview viewport preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
}
