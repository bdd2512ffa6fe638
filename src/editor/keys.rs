//! Request keys and resolved values for the editor's request cache.

use super::Generation;
use crate::entities::{Device, EditorFile, FileEntry, PreviewConfig, Project, User, Workspace};

/// Closed set of deduplicated remote operations.
///
/// Operations that target one resource carry its identity, so loading two
/// different files never collapses into one request. Workspace-bound reads
/// carry the workspace generation they were issued under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    Project,
    Workspace,
    Workspaces,
    Checkout(String),
    Files(Generation),
    File(String),
    SaveFile(String),
    Devices,
    Users,
    PreviewConfig(Generation),
}

/// Value an operation resolves with.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Project(Project),
    Workspace(Workspace),
    Workspaces(Vec<Workspace>),
    Files(Vec<FileEntry>),
    File(EditorFile),
    Devices(Vec<Device>),
    Users(Vec<User>),
    PreviewConfig(PreviewConfig),
}

/// Typed view into a [`Resource`].
pub trait Fetched: Sized {
    fn from_resource(resource: &Resource) -> Option<&Self>;
}

macro_rules! fetched {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Fetched for $ty {
                fn from_resource(resource: &Resource) -> Option<&Self> {
                    match resource {
                        Resource::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

fetched! {
    Project => Project,
    Workspace => Workspace,
    Vec<Workspace> => Workspaces,
    Vec<FileEntry> => Files,
    EditorFile => File,
    Vec<Device> => Devices,
    Vec<User> => Users,
    PreviewConfig => PreviewConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_view_matches_variant() {
        let resource = Resource::Files(vec![FileEntry::from_path("a.md")]);
        assert_eq!(Vec::<FileEntry>::from_resource(&resource).map(Vec::len), Some(1));
        assert!(Vec::<Device>::from_resource(&resource).is_none());
        assert!(EditorFile::from_resource(&resource).is_none());
    }
}
