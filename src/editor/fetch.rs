//! Resource getters and the file/workspace lifecycle.
//!
//! Every getter asks the cache and returns whatever value is held right now
//! (`None` before the first fetch lands). `then` runs when the request
//! settles. Calls made while a request is in flight share it; a call after it
//! settled starts a fresh one.

use log::{debug, info, trace, warn};

use super::{EditorState, Fetched, RequestKey, Resource, Scope, Then, assign};
use crate::core::editor_events::{FileLoaded, FileSaved};
use crate::core::request_cache::{Responder, Waiter};
use crate::entities::{Device, EditorFile, FileEntry, Project, User, Workspace};
use crate::remote::{RemoteApi, Reply};

impl EditorState {
    /// Fetch under `key`, or join the fetch already in flight for it.
    fn resolve<T, S>(
        &mut self,
        key: RequestKey,
        scope: Scope,
        slot: fn(&mut EditorState) -> &mut Option<T>,
        start: S,
        then: Option<Then<T>>,
    ) where
        T: Fetched + Clone + PartialEq + 'static,
        S: FnOnce(&dyn RemoteApi, Responder<RequestKey, Resource>),
    {
        let waiter = Self::typed_waiter(
            scope,
            move |state: &mut EditorState, value: &T| {
                if assign(slot(state), value) {
                    state.request_render();
                }
            },
            then,
        );
        self.start(key, start, waiter);
    }

    pub fn get_project(&mut self, then: Option<Then<Project>>) -> Option<&Project> {
        self.resolve(
            RequestKey::Project,
            Scope::Any,
            |s| &mut s.project,
            |remote, r| remote.get_project(Reply::new(r, Resource::Project)),
            then,
        );
        self.project.as_ref()
    }

    pub fn get_workspace(&mut self, then: Option<Then<Workspace>>) -> Option<&Workspace> {
        self.resolve(
            RequestKey::Workspace,
            Scope::Any,
            |s| &mut s.workspace,
            |remote, r| remote.get_workspace(Reply::new(r, Resource::Workspace)),
            then,
        );
        self.workspace.as_ref()
    }

    pub fn get_workspaces(&mut self, then: Option<Then<Vec<Workspace>>>) -> Option<&[Workspace]> {
        self.resolve(
            RequestKey::Workspaces,
            Scope::Any,
            |s| &mut s.workspaces,
            |remote, r| remote.get_workspaces(Reply::new(r, Resource::Workspaces)),
            then,
        );
        self.workspaces.as_deref()
    }

    /// File listing of the active workspace.
    pub fn get_files(&mut self, then: Option<Then<Vec<FileEntry>>>) -> Option<&[FileEntry]> {
        let generation = self.workspace_generation;
        self.resolve(
            RequestKey::Files(generation),
            Scope::Workspace(generation),
            |s| &mut s.files,
            |remote, r| remote.get_files(Reply::new(r, Resource::Files)),
            then,
        );
        self.files.as_deref()
    }

    pub fn get_devices(&mut self, then: Option<Then<Vec<Device>>>) -> Option<&[Device]> {
        self.resolve(
            RequestKey::Devices,
            Scope::Any,
            |s| &mut s.devices,
            |remote, r| remote.get_devices(Reply::new(r, Resource::Devices)),
            then,
        );
        self.devices.as_deref()
    }

    pub fn get_users(&mut self, then: Option<Then<Vec<User>>>) -> Option<&[User]> {
        self.resolve(
            RequestKey::Users,
            Scope::Any,
            |s| &mut s.users,
            |remote, r| remote.get_users(Reply::new(r, Resource::Users)),
            then,
        );
        self.users.as_deref()
    }

    // ========== Current file ==========

    /// Make `path` the current file.
    ///
    /// Bumps the file generation: anything still in flight for an earlier
    /// load (including its preview URL lookup) is discarded when it lands.
    pub fn load_file(&mut self, path: &str, then: Option<Then<EditorFile>>) {
        let generation = self.file_generation.bump();
        debug!("Loading {} ({:?})", path, generation);
        self.loading_file_path = Some(path.to_string());
        self.file = None;
        self.request_render();

        let (ok, err) = Then::split(then);
        let waiter = Waiter::then(move |state: &mut EditorState, resource: &Resource| {
            let Some(file) = EditorFile::from_resource(resource) else {
                return;
            };
            if state.file_generation != generation {
                trace!("Dropping stale load of {} ({:?})", file.path, generation);
                return;
            }
            state.loading_file_path = None;
            state.file = Some(file.clone());
            state.request_render();
            state.signals.emit(FileLoaded {
                path: file.path.clone(),
            });
            if file.preview_url.is_none() {
                state.resolve_preview_url(generation);
            }
            if let Some(ok) = ok {
                ok(state, file);
            }
        })
        .or_else(move |state: &mut EditorState, e| {
            if state.file_generation != generation {
                trace!("Dropping stale load failure ({:?}): {}", generation, e);
                return;
            }
            state.loading_file_path = None;
            state.request_render();
            state.catch_error(e, err);
        });

        self.start(
            RequestKey::File(path.to_string()),
            |remote, r| remote.get_file(path, Reply::new(r, Resource::File)),
            waiter,
        );
    }

    /// Drop the current file. Pending loads for it are discarded.
    pub fn close_file(&mut self) {
        self.file_generation.bump();
        self.loading_file_path = None;
        if self.file.take().is_some() {
            self.request_render();
        }
    }

    /// Persist `file`. Returns false (and does nothing) while a save of the
    /// same path is still in flight.
    pub fn save_file(&mut self, file: &EditorFile, is_raw_edit: bool, then: Option<Then<EditorFile>>) -> bool {
        let key = RequestKey::SaveFile(file.path.clone());
        if self.is_loading(&key) {
            warn!("Save of {} already in flight, skipping", file.path);
            return false;
        }

        let waiter = Self::typed_waiter(Scope::Any, |state: &mut EditorState, saved: &EditorFile| state.apply_saved(saved), then);
        self.start(
            key,
            |remote, r| remote.save_file(file, is_raw_edit, Reply::new(r, Resource::File)),
            waiter,
        )
    }

    fn apply_saved(&mut self, saved: &EditorFile) {
        info!("Saved {}", saved.path);
        if let Some(current) = self.file.as_ref().filter(|f| f.path == saved.path) {
            let mut saved = saved.clone();
            if saved.preview_url.is_none() {
                saved.preview_url = current.preview_url.clone();
            }
            if assign(&mut self.file, &saved) {
                self.request_render();
            }
        }
        self.signals.emit(FileSaved {
            path: saved.path.clone(),
        });
    }

    // ========== Workspaces ==========

    /// Check out `name`. On success every workspace-bound resource is
    /// dropped and the file listing is fetched again.
    pub fn switch_workspace(&mut self, name: &str, then: Option<Then<Workspace>>) {
        let waiter = Self::typed_waiter(Scope::Any, |state: &mut EditorState, ws: &Workspace| state.apply_checkout(ws), then);
        self.start(
            RequestKey::Checkout(name.to_string()),
            |remote, r| remote.checkout_workspace(name, Reply::new(r, Resource::Workspace)),
            waiter,
        );
    }

    fn apply_checkout(&mut self, workspace: &Workspace) {
        info!("Switched to workspace {} ({})", workspace.name, workspace.branch);
        self.workspace = Some(workspace.clone());
        self.workspace_generation.bump();
        self.file_generation.bump();
        self.files = None;
        self.file = None;
        self.loading_file_path = None;
        self.preview_config = None;
        self.request_render();
        self.get_files(None);
    }
}
