//! Editor state: the single owner of every remote-backed resource.
//!
//! All fetches go through one [`RequestCache`]; settlements are applied on
//! the owning thread by `pump()`. Split across files:
//! - `fetch.rs` - resource getters, file load/save, workspace switch
//! - `preview.rs` - preview config and preview URL resolution chain
//! - `keys.rs` - request keys and resolved values
//!
//! Continuations that outlive a file load or a workspace switch carry a
//! [`Generation`] snapshot and drop their result when it no longer matches.

pub mod fetch;
pub mod keys;
pub mod preview;

#[cfg(test)]
mod tests;

use log::{debug, trace};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::core::editor_events::RenderRequested;
use crate::core::event_bus::EventSink;
use crate::core::listeners::{ListenerId, Listeners};
use crate::core::request_cache::{self, RequestCache, Responder, Settled, Waiter};
use crate::entities::{Device, EditorFile, FileEntry, PreviewConfig, Project, User, Workspace};
use crate::remote::{RemoteApi, RemoteError};

pub use keys::{Fetched, RequestKey, Resource};

/// Identity counter for a target that async results are checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Advance and return the new value
    pub fn bump(&mut self) -> Generation {
        self.0 += 1;
        *self
    }
}

/// Resource family, used as the listener key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Project,
    Workspace,
    Workspaces,
    Files,
    File,
    Devices,
    Users,
    PreviewConfig,
}

impl RequestKey {
    pub fn kind(&self) -> ResourceKind {
        match self {
            RequestKey::Project => ResourceKind::Project,
            RequestKey::Workspace | RequestKey::Checkout(_) => ResourceKind::Workspace,
            RequestKey::Workspaces => ResourceKind::Workspaces,
            RequestKey::Files(_) => ResourceKind::Files,
            RequestKey::File(_) | RequestKey::SaveFile(_) => ResourceKind::File,
            RequestKey::Devices => ResourceKind::Devices,
            RequestKey::Users => ResourceKind::Users,
            RequestKey::PreviewConfig(_) => ResourceKind::PreviewConfig,
        }
    }
}

type ThenFn<T> = Box<dyn FnOnce(&mut EditorState, &T)>;
pub(crate) type ErrFn = Box<dyn FnOnce(&mut EditorState, &RemoteError)>;

/// Caller continuation for a getter: success callback plus optional error callback.
///
/// Without an error callback, failures are announced on the event bus.
pub struct Then<T> {
    ok: ThenFn<T>,
    err: Option<ErrFn>,
}

impl<T> Then<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut EditorState, &T) + 'static,
    {
        Self {
            ok: Box::new(f),
            err: None,
        }
    }

    pub fn or_else<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut EditorState, &RemoteError) + 'static,
    {
        self.err = Some(Box::new(f));
        self
    }

    fn split(then: Option<Self>) -> (Option<ThenFn<T>>, Option<ErrFn>) {
        match then {
            Some(then) => (Some(then.ok), then.err),
            None => (None, None),
        }
    }
}

/// Which identity a result must still match to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Any,
    Workspace(Generation),
}

/// Process-wide editor state, constructed explicitly and passed to whoever needs it.
pub struct EditorState {
    remote: Rc<dyn RemoteApi>,
    cache: RequestCache<RequestKey, Resource, EditorState>,
    listeners: Listeners<ResourceKind, Resource>,
    signals: EventSink,

    project: Option<Project>,
    workspace: Option<Workspace>,
    workspaces: Option<Vec<Workspace>>,
    files: Option<Vec<FileEntry>>,
    file: Option<EditorFile>,
    devices: Option<Vec<Device>>,
    preview_config: Option<PreviewConfig>,
    users: Option<Vec<User>>,

    loading_file_path: Option<String>,
    file_generation: Generation,
    workspace_generation: Generation,
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorState")
            .field("cache", &self.cache)
            .field("project", &self.project.as_ref().map(|p| &p.name))
            .field("workspace", &self.workspace.as_ref().map(|w| &w.name))
            .field("files", &self.files.as_ref().map(Vec::len))
            .field("file", &self.file.as_ref().map(|f| &f.path))
            .field("loading_file_path", &self.loading_file_path)
            .field("file_generation", &self.file_generation)
            .field("workspace_generation", &self.workspace_generation)
            .finish()
    }
}

impl EditorState {
    pub fn new(remote: Rc<dyn RemoteApi>, signals: EventSink) -> Self {
        Self {
            remote,
            cache: RequestCache::new(signals.clone()),
            listeners: Listeners::new(),
            signals,
            project: None,
            workspace: None,
            workspaces: None,
            files: None,
            file: None,
            devices: None,
            preview_config: None,
            users: None,
            loading_file_path: None,
            file_generation: Generation::default(),
            workspace_generation: Generation::default(),
        }
    }

    // ========== Accessors ==========

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub fn workspaces(&self) -> Option<&[Workspace]> {
        self.workspaces.as_deref()
    }

    pub fn files(&self) -> Option<&[FileEntry]> {
        self.files.as_deref()
    }

    pub fn file(&self) -> Option<&EditorFile> {
        self.file.as_ref()
    }

    pub fn devices(&self) -> Option<&[Device]> {
        self.devices.as_deref()
    }

    pub fn users(&self) -> Option<&[User]> {
        self.users.as_deref()
    }

    pub fn preview_config(&self) -> Option<&PreviewConfig> {
        self.preview_config.as_ref()
    }

    /// Path being loaded; distinguishes "loading" from "no file chosen".
    pub fn loading_file_path(&self) -> Option<&str> {
        self.loading_file_path.as_deref()
    }

    pub fn file_generation(&self) -> Generation {
        self.file_generation
    }

    pub fn workspace_generation(&self) -> Generation {
        self.workspace_generation
    }

    pub fn signals(&self) -> &EventSink {
        &self.signals
    }

    /// True while an operation for `key` is outstanding.
    pub fn is_loading(&self, key: &RequestKey) -> bool {
        self.cache.in_progress(key)
    }

    /// No remote operation outstanding
    pub fn is_idle(&self) -> bool {
        self.cache.is_empty()
    }

    /// Forget a held resource. Accessors return `None` until a getter refetches it.
    pub fn invalidate(&mut self, kind: ResourceKind) {
        debug!("Invalidating {:?}", kind);
        match kind {
            ResourceKind::Project => self.project = None,
            ResourceKind::Workspace => self.workspace = None,
            ResourceKind::Workspaces => self.workspaces = None,
            ResourceKind::Files => self.files = None,
            ResourceKind::File => self.file = None,
            ResourceKind::Devices => self.devices = None,
            ResourceKind::Users => self.users = None,
            ResourceKind::PreviewConfig => self.preview_config = None,
        }
        self.request_render();
    }

    // ========== Listeners ==========

    /// Listen for every successful settlement of a resource family.
    pub fn on<F>(&mut self, kind: ResourceKind, callback: F) -> ListenerId
    where
        F: Fn(&Resource) + 'static,
    {
        self.listeners.on(kind, callback)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    // ========== Settlement ==========

    /// Apply every settled operation available now. Returns how many.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Some(settled) = self.cache.next_settled() {
            self.deliver(settled);
            count += 1;
        }
        count
    }

    /// Block up to `timeout` for one settlement, then drain the rest.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.cache.wait_settled(timeout) {
            Some(settled) => {
                self.deliver(settled);
                1 + self.pump()
            }
            None => 0,
        }
    }

    fn deliver(&mut self, settled: Settled<RequestKey, Resource, EditorState>) {
        if let Some((key, value)) = settled.dispatch(self) {
            self.listeners.fire(&key.kind(), &value);
        }
    }

    // ========== Errors & signals ==========

    /// Route a remote failure: to `callback` if given, else to the announce sink.
    pub fn catch_error(&mut self, err: &RemoteError, callback: Option<ErrFn>) {
        match callback {
            Some(callback) => callback(self, err),
            None => request_cache::announce(&self.signals, err),
        }
    }

    pub(crate) fn request_render(&self) {
        self.signals.emit(RenderRequested);
    }

    pub(crate) fn in_scope(&self, scope: Scope) -> bool {
        match scope {
            Scope::Any => true,
            Scope::Workspace(generation) => generation == self.workspace_generation,
        }
    }

    // ========== Request plumbing ==========

    /// Hand `key` to the cache; `start` runs only if nothing is in flight for it.
    pub(crate) fn start<S>(&mut self, key: RequestKey, start: S, waiter: Waiter<EditorState, Resource>) -> bool
    where
        S: FnOnce(&dyn RemoteApi, Responder<RequestKey, Resource>),
    {
        let remote = Rc::clone(&self.remote);
        self.cache.request(key, move |responder| start(remote.as_ref(), responder), Some(waiter))
    }

    /// Waiter that applies a typed value (if still in scope), then runs the caller's continuation.
    pub(crate) fn typed_waiter<T, A>(scope: Scope, apply: A, then: Option<Then<T>>) -> Waiter<EditorState, Resource>
    where
        T: Fetched + 'static,
        A: FnOnce(&mut EditorState, &T) + 'static,
    {
        let (ok, err) = Then::split(then);
        let waiter = Waiter::then(move |state: &mut EditorState, resource: &Resource| {
            let Some(value) = T::from_resource(resource) else {
                debug!("Resource variant mismatch: {:?}", resource);
                return;
            };
            if !state.in_scope(scope) {
                trace!("Dropping out-of-scope result ({:?})", scope);
                return;
            }
            apply(state, value);
            if let Some(ok) = ok {
                ok(state, value);
            }
        });
        match err {
            Some(err) => waiter.or_else(move |state, e| err(state, e)),
            None => waiter,
        }
    }
}

/// Replace `slot` if the value differs. Returns true on change.
pub(crate) fn assign<T: Clone + PartialEq>(slot: &mut Option<T>, value: &T) -> bool {
    if slot.as_ref() == Some(value) {
        return false;
    }
    *slot = Some(value.clone());
    true
}
