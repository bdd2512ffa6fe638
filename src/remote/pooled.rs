//! Blocking sources adapted onto the worker pool.

use std::sync::Arc;

use super::{RemoteApi, RemoteError, Reply};
use crate::core::workers::Workers;
use crate::entities::{
    Device, EditorFile, FileEntry, PreviewConfig, PreviewSettings, Project, User, Workspace,
};

/// Request/response data source. Calls may block; they run off the owning thread.
pub trait BlockingRemote: Send + Sync + 'static {
    fn get_project(&self) -> Result<Project, RemoteError>;
    fn get_workspace(&self) -> Result<Workspace, RemoteError>;
    fn get_workspaces(&self) -> Result<Vec<Workspace>, RemoteError>;
    fn checkout_workspace(&self, name: &str) -> Result<Workspace, RemoteError>;
    fn get_files(&self) -> Result<Vec<FileEntry>, RemoteError>;
    fn get_file(&self, path: &str) -> Result<EditorFile, RemoteError>;
    fn get_devices(&self) -> Result<Vec<Device>, RemoteError>;
    fn get_users(&self) -> Result<Vec<User>, RemoteError>;
    fn get_preview_config(
        &self,
        settings: &PreviewSettings,
        workspace: &Workspace,
    ) -> Result<PreviewConfig, RemoteError>;
    fn save_file(&self, file: &EditorFile, is_raw_edit: bool) -> Result<EditorFile, RemoteError>;
}

/// [`RemoteApi`] over a [`BlockingRemote`]: each call becomes a worker job
/// that answers its reply when the source returns.
pub struct PooledRemote<B> {
    source: Arc<B>,
    workers: Arc<Workers>,
}

impl<B: BlockingRemote> PooledRemote<B> {
    pub fn new(source: Arc<B>, workers: Arc<Workers>) -> Self {
        Self { source, workers }
    }

    pub fn source(&self) -> &Arc<B> {
        &self.source
    }

    fn spawn<T, F>(&self, reply: Reply<T>, call: F)
    where
        T: 'static,
        F: FnOnce(&B) -> Result<T, RemoteError> + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        self.workers.execute(move || reply.settle(call(source.as_ref())));
    }
}

impl<B: BlockingRemote> RemoteApi for PooledRemote<B> {
    fn get_project(&self, reply: Reply<Project>) {
        self.spawn(reply, |s| s.get_project());
    }

    fn get_workspace(&self, reply: Reply<Workspace>) {
        self.spawn(reply, |s| s.get_workspace());
    }

    fn get_workspaces(&self, reply: Reply<Vec<Workspace>>) {
        self.spawn(reply, |s| s.get_workspaces());
    }

    fn checkout_workspace(&self, name: &str, reply: Reply<Workspace>) {
        let name = name.to_string();
        self.spawn(reply, move |s| s.checkout_workspace(&name));
    }

    fn get_files(&self, reply: Reply<Vec<FileEntry>>) {
        self.spawn(reply, |s| s.get_files());
    }

    fn get_file(&self, path: &str, reply: Reply<EditorFile>) {
        let path = path.to_string();
        self.spawn(reply, move |s| s.get_file(&path));
    }

    fn get_devices(&self, reply: Reply<Vec<Device>>) {
        self.spawn(reply, |s| s.get_devices());
    }

    fn get_users(&self, reply: Reply<Vec<User>>) {
        self.spawn(reply, |s| s.get_users());
    }

    fn get_preview_config(
        &self,
        settings: &PreviewSettings,
        workspace: &Workspace,
        reply: Reply<PreviewConfig>,
    ) {
        let settings = settings.clone();
        let workspace = workspace.clone();
        self.spawn(reply, move |s| s.get_preview_config(&settings, &workspace));
    }

    fn save_file(&self, file: &EditorFile, is_raw_edit: bool, reply: Reply<EditorFile>) {
        let file = file.clone();
        self.spawn(reply, move |s| s.save_file(&file, is_raw_edit));
    }
}
