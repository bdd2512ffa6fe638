//! Test double: parks every call until the test answers it.
//!
//! Answers come from a [`Site`], looked up when the call is made. Tests pick
//! which parked call settles and when, so interleavings are deterministic.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::{RemoteApi, RemoteError, Reply, Site};
use crate::entities::{
    Device, EditorFile, FileEntry, PreviewConfig, PreviewSettings, Project, User, Workspace,
};

type Answer = Box<dyn FnOnce(Option<RemoteError>)>;

struct Call {
    op: &'static str,
    answer: Answer,
}

pub(crate) struct ScriptedRemote {
    pub site: RefCell<Site>,
    parked: RefCell<VecDeque<Call>>,
    history: RefCell<Vec<&'static str>>,
}

impl ScriptedRemote {
    pub fn new(site: Site) -> Self {
        Self {
            site: RefCell::new(site),
            parked: RefCell::new(VecDeque::new()),
            history: RefCell::new(Vec::new()),
        }
    }

    /// How many times `op` was invoked
    pub fn count(&self, op: &str) -> usize {
        self.history.borrow().iter().filter(|o| **o == op).count()
    }

    /// Ops still waiting for an answer, oldest first
    pub fn parked(&self) -> Vec<&'static str> {
        self.parked.borrow().iter().map(|c| c.op).collect()
    }

    /// Answer the oldest parked `op` with its canned result.
    pub fn resolve(&self, op: &str) -> bool {
        self.answer(op, None)
    }

    /// Reject the oldest parked `op` with `err`.
    pub fn fail(&self, op: &str, err: RemoteError) -> bool {
        self.answer(op, Some(err))
    }

    /// Answer everything parked so far, in call order.
    pub fn resolve_all(&self) -> usize {
        let calls: Vec<Call> = self.parked.borrow_mut().drain(..).collect();
        let count = calls.len();
        for call in calls {
            (call.answer)(None);
        }
        count
    }

    fn answer(&self, op: &str, err: Option<RemoteError>) -> bool {
        let call = {
            let mut parked = self.parked.borrow_mut();
            let Some(pos) = parked.iter().position(|c| c.op == op) else {
                return false;
            };
            parked.remove(pos)
        };
        match call {
            Some(call) => {
                (call.answer)(err);
                true
            }
            None => false,
        }
    }

    fn park<T: 'static>(&self, op: &'static str, reply: Reply<T>, result: Result<T, RemoteError>) {
        self.history.borrow_mut().push(op);
        self.parked.borrow_mut().push_back(Call {
            op,
            answer: Box::new(move |err| match err {
                Some(err) => reply.reject(err),
                None => reply.settle(result),
            }),
        });
    }
}

impl RemoteApi for ScriptedRemote {
    fn get_project(&self, reply: Reply<Project>) {
        let result = Ok(self.site.borrow().project.clone());
        self.park("get_project", reply, result);
    }

    fn get_workspace(&self, reply: Reply<Workspace>) {
        let result = self.site.borrow().current();
        self.park("get_workspace", reply, result);
    }

    fn get_workspaces(&self, reply: Reply<Vec<Workspace>>) {
        let result = Ok(self.site.borrow().workspaces.clone());
        self.park("get_workspaces", reply, result);
    }

    fn checkout_workspace(&self, name: &str, reply: Reply<Workspace>) {
        let result = self.site.borrow_mut().checkout(name);
        self.park("checkout_workspace", reply, result);
    }

    fn get_files(&self, reply: Reply<Vec<FileEntry>>) {
        let result = Ok(self.site.borrow().entries());
        self.park("get_files", reply, result);
    }

    fn get_file(&self, path: &str, reply: Reply<EditorFile>) {
        let result = self.site.borrow().file(path);
        self.park("get_file", reply, result);
    }

    fn get_devices(&self, reply: Reply<Vec<Device>>) {
        let result = Ok(self.site.borrow().devices.clone());
        self.park("get_devices", reply, result);
    }

    fn get_users(&self, reply: Reply<Vec<User>>) {
        let result = Ok(self.site.borrow().users.clone());
        self.park("get_users", reply, result);
    }

    fn get_preview_config(
        &self,
        settings: &PreviewSettings,
        _workspace: &Workspace,
        reply: Reply<PreviewConfig>,
    ) {
        let result = self.site.borrow().preview_config(settings);
        self.park("get_preview_config", reply, result);
    }

    fn save_file(&self, file: &EditorFile, is_raw_edit: bool, reply: Reply<EditorFile>) {
        let result = self.site.borrow_mut().save(file, is_raw_edit);
        self.park("save_file", reply, result);
    }
}
