//! JSON site fixture used as a local data source.
//!
//! A site file holds the project, its workspaces, per-workspace files, users,
//! devices and the preview routing table. Saves are kept in memory.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use super::{BlockingRemote, RemoteError};
use crate::entities::{
    Device, EditorFile, FileEntry, PreviewConfig, PreviewSettings, Project, User, Workspace,
};

/// Everything a fixture source can answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub project: Project,
    pub workspaces: Vec<Workspace>,
    /// Active workspace name; defaults to the default (or first) workspace
    #[serde(default)]
    pub current_workspace: Option<String>,
    /// Files keyed by workspace name
    #[serde(default)]
    pub files: BTreeMap<String, Vec<EditorFile>>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub devices: Vec<Device>,
    /// Routing tables keyed by preview target
    #[serde(default)]
    pub preview: BTreeMap<String, PreviewConfig>,
    /// Simulated round-trip latency per call
    #[serde(default)]
    pub latency_ms: u64,
}

impl Site {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse site fixture")
    }

    /// Active workspace
    pub fn workspace(&self) -> Option<&Workspace> {
        match &self.current_workspace {
            Some(name) => self.workspaces.iter().find(|w| &w.name == name),
            None => self
                .workspaces
                .iter()
                .find(|w| w.is_default)
                .or_else(|| self.workspaces.first()),
        }
    }

    fn workspace_files(&self) -> &[EditorFile] {
        self.workspace()
            .and_then(|w| self.files.get(&w.name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn current(&self) -> Result<Workspace, RemoteError> {
        self.workspace().cloned().ok_or_else(|| RemoteError::not_found("Workspace"))
    }

    pub fn checkout(&mut self, name: &str) -> Result<Workspace, RemoteError> {
        let workspace = self
            .workspaces
            .iter()
            .find(|w| w.name == name)
            .cloned()
            .ok_or_else(|| RemoteError::not_found(format!("Workspace {}", name)))?;
        self.current_workspace = Some(workspace.name.clone());
        Ok(workspace)
    }

    pub fn entries(&self) -> Vec<FileEntry> {
        self.workspace_files()
            .iter()
            .map(|file| {
                let mut entry = FileEntry::from_path(&file.path);
                entry.collection = file
                    .path
                    .rsplit_once('/')
                    .map(|(dir, _)| dir.rsplit('/').next().unwrap_or(dir).to_string());
                entry.size = Some(file.body.len() as u64);
                entry
            })
            .collect()
    }

    pub fn file(&self, path: &str) -> Result<EditorFile, RemoteError> {
        self.workspace_files()
            .iter()
            .find(|f| f.path == path)
            .cloned()
            .ok_or_else(|| RemoteError::not_found(path))
    }

    pub fn preview_config(&self, settings: &PreviewSettings) -> Result<PreviewConfig, RemoteError> {
        self.preview.get(&settings.target).cloned().ok_or_else(|| {
            RemoteError::not_found(format!("Preview config for {}", settings.target))
                .with_description("The project's preview target has no routing table")
        })
    }

    /// Store `file` in the active workspace. Raw edits keep the stored data.
    pub fn save(&mut self, file: &EditorFile, is_raw_edit: bool) -> Result<EditorFile, RemoteError> {
        let workspace = self.current()?;
        let files = self.files.entry(workspace.name).or_default();

        let saved = match files.iter_mut().find(|f| f.path == file.path) {
            Some(stored) => {
                if is_raw_edit {
                    stored.body = file.body.clone();
                } else {
                    stored.data = file.data.clone();
                    stored.body = file.body.clone();
                }
                stored.clone()
            }
            None => {
                files.push(file.clone());
                file.clone()
            }
        };
        Ok(saved)
    }
}

/// [`BlockingRemote`] answering from an in-memory [`Site`].
#[derive(Debug)]
pub struct FixtureRemote {
    site: Mutex<Site>,
    latency: Duration,
}

impl FixtureRemote {
    pub fn new(site: Site) -> Self {
        let latency = Duration::from_millis(site.latency_ms);
        Self {
            site: Mutex::new(site),
            latency,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read site fixture: {}", path.display()))?;
        let site = Site::from_json(&json)
            .with_context(|| format!("Invalid site fixture: {}", path.display()))?;
        info!(
            "Loaded site {:?}: {} workspace(s), {} file set(s)",
            site.project.name,
            site.workspaces.len(),
            site.files.len()
        );
        Ok(Self::new(site))
    }

    /// Snapshot of the current site contents
    pub fn snapshot(&self) -> Site {
        self.site.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn with_site<T>(&self, op: &str, f: impl FnOnce(&mut Site) -> Result<T, RemoteError>) -> Result<T, RemoteError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        debug!("Fixture call: {}", op);
        let mut site = self.site.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut site)
    }
}

impl BlockingRemote for FixtureRemote {
    fn get_project(&self) -> Result<Project, RemoteError> {
        self.with_site("get_project", |s| Ok(s.project.clone()))
    }

    fn get_workspace(&self) -> Result<Workspace, RemoteError> {
        self.with_site("get_workspace", |s| s.current())
    }

    fn get_workspaces(&self) -> Result<Vec<Workspace>, RemoteError> {
        self.with_site("get_workspaces", |s| Ok(s.workspaces.clone()))
    }

    fn checkout_workspace(&self, name: &str) -> Result<Workspace, RemoteError> {
        self.with_site("checkout_workspace", |s| s.checkout(name))
    }

    fn get_files(&self) -> Result<Vec<FileEntry>, RemoteError> {
        self.with_site("get_files", |s| Ok(s.entries()))
    }

    fn get_file(&self, path: &str) -> Result<EditorFile, RemoteError> {
        self.with_site("get_file", |s| s.file(path))
    }

    fn get_devices(&self) -> Result<Vec<Device>, RemoteError> {
        self.with_site("get_devices", |s| Ok(s.devices.clone()))
    }

    fn get_users(&self) -> Result<Vec<User>, RemoteError> {
        self.with_site("get_users", |s| Ok(s.users.clone()))
    }

    fn get_preview_config(
        &self,
        settings: &PreviewSettings,
        _workspace: &Workspace,
    ) -> Result<PreviewConfig, RemoteError> {
        self.with_site("get_preview_config", |s| s.preview_config(settings))
    }

    fn save_file(&self, file: &EditorFile, is_raw_edit: bool) -> Result<EditorFile, RemoteError> {
        self.with_site("save_file", |s| s.save(file, is_raw_edit))
    }
}
