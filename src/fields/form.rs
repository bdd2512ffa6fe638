//! Form over the current file's list fields.
//!
//! The form owns its lists; the editor never touches them directly. Bus
//! events from the editor reach the form through `handle_event`, called by
//! whoever polls the bus.

use anyhow::{Result, bail};
use indexmap::IndexMap;
use log::{debug, info, trace};

use super::{ListField, ListKind, LockToken};
use crate::core::editor_events::{FileLoaded, FileSaved, MutationSettled};
use crate::core::event_bus::{BoxedEvent, EventSink, downcast_event};
use crate::editor::{EditorState, Then};
use crate::entities::EditorFile;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct EditorForm {
    /// File the lists were last synced from
    path: Option<String>,
    lists: IndexMap<String, ListField<Value>>,
    signals: EventSink,
}

impl EditorForm {
    pub fn new(signals: EventSink) -> Self {
        Self {
            path: None,
            lists: IndexMap::new(),
            signals,
        }
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Register a list backed by the file data key `name`.
    pub fn add_list(&mut self, name: &str, kind: ListKind) -> &mut ListField<Value> {
        let field = kind.field(name, Vec::new()).with_signals(self.signals.clone());
        self.lists.entry(name.to_string()).or_insert(field)
    }

    /// Register a list for every array field of `file` whose kind can be
    /// detected. Returns how many were added.
    pub fn add_detected(&mut self, file: &EditorFile) -> usize {
        let mut added = 0;
        for (name, value) in &file.data {
            let Some(items) = value.as_array() else {
                continue;
            };
            if self.lists.contains_key(name) {
                continue;
            }
            if let Some(kind) = ListKind::detect(items) {
                debug!("Detected {} list {:?}", kind, name);
                self.add_list(name, kind);
                added += 1;
            }
        }
        added
    }

    pub fn list(&self, name: &str) -> Option<&ListField<Value>> {
        self.lists.get(name)
    }

    pub fn list_mut(&mut self, name: &str) -> Option<&mut ListField<Value>> {
        self.lists.get_mut(name)
    }

    pub fn lists(&self) -> impl Iterator<Item = (&str, &ListField<Value>)> {
        self.lists.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn is_clean(&self) -> bool {
        self.lists.values().all(ListField::is_clean)
    }

    pub fn is_valid(&self) -> bool {
        self.lists.values().all(ListField::is_valid)
    }

    /// Open lock cycles across every list
    pub fn outstanding_tokens(&self) -> Vec<LockToken> {
        self.lists.values().flat_map(ListField::outstanding).collect()
    }

    /// Take authoritative values from `file`.
    ///
    /// A different file than last time resets every list, dropping its locks.
    pub fn sync(&mut self, file: &EditorFile) {
        let same_file = self.path.as_deref() == Some(file.path.as_str());
        for (name, field) in self.lists.iter_mut() {
            let value = file.list(name);
            if same_file {
                field.set_value(value);
            } else {
                field.reset(value);
            }
        }
        if !same_file {
            debug!("Form now tracks {}", file.path);
            self.path = Some(file.path.clone());
        }
    }

    /// `base` with every list's current value written into its data.
    pub fn to_file(&self, base: &EditorFile) -> EditorFile {
        let mut file = base.clone();
        for (name, field) in &self.lists {
            file.set_list(name.clone(), field.value());
        }
        file
    }

    /// Save the current file with this form's lists.
    ///
    /// Lock cycles open now are released once the save resolves; cycles
    /// opened later wait for the next commit. A failed save releases nothing.
    pub fn commit(&mut self, state: &mut EditorState, is_raw_edit: bool) -> Result<()> {
        let Some(base) = state.file().cloned() else {
            bail!("No file open");
        };
        if self.path.as_deref() != Some(base.path.as_str()) {
            bail!("Form is not synced with {}", base.path);
        }
        if !self.is_valid() {
            bail!("{} has invalid list items", base.path);
        }

        let tokens = self.outstanding_tokens();
        let file = self.to_file(&base);
        let signals = self.signals.clone();
        info!("Committing {} ({} lock cycle(s))", file.path, tokens.len());

        let started = state.save_file(
            &file,
            is_raw_edit,
            Some(Then::new(move |_: &mut EditorState, _: &EditorFile| {
                signals.emit(MutationSettled { tokens });
            })),
        );
        if !started {
            bail!("Save of {} already in progress", file.path);
        }
        Ok(())
    }

    /// Route one bus event. Returns true if the form acted on it.
    pub fn handle_event(&mut self, event: &BoxedEvent, state: &EditorState) -> bool {
        if let Some(settled) = downcast_event::<MutationSettled>(event) {
            let released = self.settle(&settled.tokens);
            trace!("MutationSettled released {} cycle(s)", released);
            return released > 0;
        }

        let path = downcast_event::<FileLoaded>(event)
            .map(|e| &e.path)
            .or_else(|| downcast_event::<FileSaved>(event).map(|e| &e.path));
        let Some(path) = path else {
            return false;
        };
        match state.file().filter(|f| &f.path == path) {
            Some(file) => {
                self.sync(file);
                true
            }
            None => false,
        }
    }

    /// Close every cycle named in `tokens`. Returns how many closed.
    pub fn settle(&mut self, tokens: &[LockToken]) -> usize {
        let mut released = 0;
        for field in self.lists.values_mut() {
            for token in tokens {
                if field.settle(*token) {
                    released += 1;
                }
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::EventBus;
    use crate::remote::fixture::sample;
    use crate::remote::scripted::ScriptedRemote;
    use std::rc::Rc;

    const HELLO: &str = "content/posts/hello.md";

    fn open() -> (Rc<ScriptedRemote>, EditorState, EventBus, EditorForm) {
        let remote = Rc::new(ScriptedRemote::new(sample::site()));
        let bus = EventBus::new();
        let mut state = EditorState::new(remote.clone(), EventSink::from_bus(&bus));
        let mut form = EditorForm::new(EventSink::from_bus(&bus));
        form.add_list("gallery", ListKind::Media);
        form.add_list("menu", ListKind::Menu);

        state.load_file(HELLO, None);
        remote.resolve("get_file");
        state.pump();
        route(&bus, &mut form, &state);
        (remote, state, bus, form)
    }

    fn route(bus: &EventBus, form: &mut EditorForm, state: &EditorState) {
        for event in bus.poll() {
            form.handle_event(&event, state);
        }
    }

    #[test]
    fn test_sync_on_load() {
        let (_remote, _state, _bus, mut form) = open();
        assert_eq!(form.path(), Some(HELLO));
        let gallery = form.list_mut("gallery").unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.items()[1].value()["src"], "b.png");
        assert!(form.is_clean());
        assert!(form.is_valid());
    }

    #[test]
    fn test_commit_releases_locks_after_save() {
        let (remote, mut state, bus, mut form) = open();

        let gallery = form.list_mut("gallery").unwrap();
        let token = gallery.handle_duplicate_item(0).unwrap();
        assert!(!form.is_clean());

        form.commit(&mut state, false).unwrap();
        assert!(form.commit(&mut state, false).is_err());

        // A cycle opened after the commit belongs to the next save
        let later = form.list_mut("menu").unwrap().handle_sort(0, 0).unwrap();
        assert!(later.is_none());
        let late = form.list_mut("menu").unwrap().handle_insert_item(None).unwrap();

        remote.resolve("save_file");
        state.pump();
        route(&bus, &mut form, &state);

        let gallery = form.list("gallery").unwrap();
        assert!(!gallery.is_locked());
        assert_eq!(gallery.len(), 3);
        assert!(gallery.is_clean());
        assert_eq!(form.list("menu").unwrap().outstanding(), vec![late]);
        assert!(!form.is_clean());
        assert_ne!(token, late);

        let stored = remote.site.borrow().file(HELLO).unwrap();
        assert_eq!(stored.list("gallery").len(), 3);
    }

    #[test]
    fn test_failed_save_keeps_locks() {
        let (remote, mut state, bus, mut form) = open();

        form.list_mut("gallery").unwrap().handle_delete_item(1).unwrap();
        form.commit(&mut state, false).unwrap();
        remote.fail("save_file", crate::remote::RemoteError::new("conflict"));
        state.pump();
        route(&bus, &mut form, &state);

        assert!(form.list("gallery").unwrap().is_locked());
        assert!(!form.is_clean());
    }

    #[test]
    fn test_commit_rejects_invalid_items() {
        let (_remote, mut state, _bus, mut form) = open();
        form.list_mut("menu").unwrap().handle_insert_item(None).unwrap();
        assert!(!form.is_valid());
        assert!(form.commit(&mut state, false).is_err());
        assert!(!state.is_loading(&crate::editor::RequestKey::SaveFile(HELLO.into())));
    }

    #[test]
    fn test_add_detected_skips_known_and_plain() {
        let mut form = EditorForm::default();
        form.add_list("gallery", ListKind::Media);

        let mut file = EditorFile::new("a.md");
        file.set_list("gallery", vec![serde_json::json!({ "src": "a.png" })]);
        file.set_list("menu", vec![serde_json::json!({ "title": "Home" })]);
        file.set_list("tags", vec![serde_json::json!("rust")]);

        assert_eq!(form.add_detected(&file), 1);
        let names: Vec<&str> = form.lists().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["gallery", "menu"]);
    }

    #[test]
    fn test_other_file_resets_lists() {
        let (_remote, _state, _bus, mut form) = open();
        form.list_mut("gallery").unwrap().handle_delete_item(0).unwrap();

        let mut other = EditorFile::new("content/other.md");
        other.set_list("gallery", vec![serde_json::json!({ "src": "z.png" })]);
        form.sync(&other);

        let gallery = form.list("gallery").unwrap();
        assert!(!gallery.is_locked());
        assert_eq!(gallery.value(), vec![serde_json::json!({ "src": "z.png" })]);
        assert_eq!(form.list("menu").unwrap().len(), 0);
    }
}
