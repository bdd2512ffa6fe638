//! Preview config and the preview URL chain.
//!
//! The config depends on the project's preview settings and the active
//! workspace. Each link fetches its own dependency only when it is missing,
//! then re-enters the chain once it lands.

use log::{debug, trace};
use std::cell::RefCell;
use std::rc::Rc;

use super::{EditorState, Generation, RequestKey, Resource, Scope, Then, assign};
use crate::entities::PreviewConfig;
use crate::remote::{RemoteError, Reply};

/// Error code passed to the caller when the project declares no preview target.
pub const NO_PREVIEW_TARGET: &str = "no_preview_target";

impl EditorState {
    /// Preview routing for the active workspace.
    ///
    /// Missing project or workspace are fetched first; a failure there reaches
    /// the caller's error callback (or is announced without one). A project
    /// without a preview target is not a remote failure: the caller's error
    /// callback gets a [`NO_PREVIEW_TARGET`] error, otherwise nothing happens.
    pub fn get_preview_config(&mut self, then: Option<Then<PreviewConfig>>) -> Option<&PreviewConfig> {
        let Some(project) = self.project.clone() else {
            self.get_project(Some(retry_preview(then)));
            return self.preview_config.as_ref();
        };
        let Some(settings) = project.preview else {
            debug!("Project {} has no preview target", project.id);
            if let Some(err) = then.and_then(|then| then.err) {
                let e = RemoteError::new(format!("Project {} has no preview target", project.id))
                    .with_code(NO_PREVIEW_TARGET);
                err(self, &e);
            }
            return self.preview_config.as_ref();
        };
        let Some(workspace) = self.workspace.clone() else {
            self.get_workspace(Some(retry_preview(then)));
            return self.preview_config.as_ref();
        };

        let generation = self.workspace_generation;
        let waiter = Self::typed_waiter(
            Scope::Workspace(generation),
            |state: &mut EditorState, config: &PreviewConfig| {
                if assign(&mut state.preview_config, config) {
                    state.request_render();
                }
            },
            then,
        );
        self.start(
            RequestKey::PreviewConfig(generation),
            |remote, r| remote.get_preview_config(&settings, &workspace, Reply::new(r, Resource::PreviewConfig)),
            waiter,
        );
        self.preview_config.as_ref()
    }

    /// Fill in the current file's preview URL if it has none.
    ///
    /// `generation` is the file generation the caller saw; the chain stops as
    /// soon as the current file changes.
    pub(crate) fn resolve_preview_url(&mut self, generation: Generation) {
        if self.file_generation != generation {
            trace!("Skipping preview URL for stale file ({:?})", generation);
            return;
        }
        let Some(path) = self
            .file
            .as_ref()
            .filter(|f| f.preview_url.is_none())
            .map(|f| f.path.clone())
        else {
            return;
        };

        self.get_preview_config(Some(Then::new(move |state: &mut EditorState, config: &PreviewConfig| {
            state.apply_preview_url(generation, &path, config);
        })));
    }

    fn apply_preview_url(&mut self, generation: Generation, path: &str, config: &PreviewConfig) {
        let current = self.file.as_ref().map(|f| f.path.as_str());
        if self.file_generation != generation || current != Some(path) {
            trace!("Dropping preview URL for {} ({:?})", path, generation);
            return;
        }

        let url = config.url_for(path);
        debug!("Preview URL for {}: {:?}", path, url);
        let changed = match self.file.as_mut() {
            Some(file) if file.preview_url != url => {
                file.preview_url = url;
                true
            }
            _ => false,
        };
        if changed {
            self.request_render();
        }
    }
}

/// Dependency continuation that re-enters `get_preview_config` once the
/// dependency lands, forwarding the caller's error callback if it fails.
fn retry_preview<D: 'static>(then: Option<Then<PreviewConfig>>) -> Then<D> {
    let Some(Then { ok, err }) = then else {
        return Then::new(|state: &mut EditorState, _: &D| {
            state.get_preview_config(None);
        });
    };
    let Some(err) = err else {
        return Then::new(move |state: &mut EditorState, _: &D| {
            state.get_preview_config(Some(Then { ok, err: None }));
        });
    };

    // Exactly one of the two halves runs; both need the caller's callback
    let err = Rc::new(RefCell::new(Some(err)));
    let on_retry = Rc::clone(&err);
    Then::new(move |state: &mut EditorState, _: &D| {
        let err = on_retry.borrow_mut().take();
        state.get_preview_config(Some(Then { ok, err }));
    })
    .or_else(move |state: &mut EditorState, e: &RemoteError| {
        if let Some(err) = err.borrow_mut().take() {
            err(state, e);
        }
    })
}
