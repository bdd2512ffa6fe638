//! Remote data-access boundary.
//!
//! # Key types
//!
//! - [`RemoteApi`] - non-blocking interface the editor calls; every operation
//!   answers later through a typed [`Reply`]
//! - [`BlockingRemote`] - plain request/response source, adapted to
//!   `RemoteApi` by [`PooledRemote`] running calls on the worker pool
//! - [`FixtureRemote`] - JSON site file source used by the CLI
//! - [`RemoteError`] - normalized failure
//!
//! Calls across this boundary are the only suspension points of the core.

pub mod error;
pub mod fixture;
pub mod pooled;

#[cfg(test)]
pub(crate) mod scripted;

pub use error::RemoteError;
pub use fixture::{FixtureRemote, Site};
pub use pooled::{BlockingRemote, PooledRemote};

use crate::core::request_cache::Responder;
use crate::editor::keys::{RequestKey, Resource};
use crate::entities::{
    Device, EditorFile, FileEntry, PreviewConfig, PreviewSettings, Project, User, Workspace,
};

/// Typed answer handle for one remote call.
///
/// Can be moved to another thread. Dropping it unanswered rejects the call.
pub struct Reply<T> {
    responder: Responder<RequestKey, Resource>,
    wrap: fn(T) -> Resource,
}

impl<T> Reply<T> {
    pub(crate) fn new(responder: Responder<RequestKey, Resource>, wrap: fn(T) -> Resource) -> Self {
        Self { responder, wrap }
    }

    pub fn resolve(self, value: T) {
        self.responder.resolve((self.wrap)(value));
    }

    pub fn reject(self, err: RemoteError) {
        self.responder.reject(err);
    }

    pub fn settle(self, result: Result<T, RemoteError>) {
        self.responder.settle(result.map(self.wrap));
    }
}

impl<T> std::fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply").field("responder", &self.responder).finish()
    }
}

/// Non-blocking data access. Implementations must eventually answer every reply.
pub trait RemoteApi {
    fn get_project(&self, reply: Reply<Project>);
    fn get_workspace(&self, reply: Reply<Workspace>);
    fn get_workspaces(&self, reply: Reply<Vec<Workspace>>);
    /// Make `name` the active workspace; resolves with it.
    fn checkout_workspace(&self, name: &str, reply: Reply<Workspace>);
    fn get_files(&self, reply: Reply<Vec<FileEntry>>);
    fn get_file(&self, path: &str, reply: Reply<EditorFile>);
    fn get_devices(&self, reply: Reply<Vec<Device>>);
    fn get_users(&self, reply: Reply<Vec<User>>);
    fn get_preview_config(
        &self,
        settings: &PreviewSettings,
        workspace: &Workspace,
        reply: Reply<PreviewConfig>,
    );
    /// Persist `file`. Raw edits replace the body only.
    fn save_file(&self, file: &EditorFile, is_raw_edit: bool, reply: Reply<EditorFile>);
}
