use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::core::editor_events::{Announcement, FileLoaded, FileSaved};
use crate::core::event_bus::{BoxedEvent, EventBus, downcast_event};
use crate::remote::fixture::sample;
use crate::remote::scripted::ScriptedRemote;

const HELLO: &str = "content/posts/hello.md";
const ABOUT: &str = "content/about.md";

fn setup() -> (Rc<ScriptedRemote>, EditorState, EventBus) {
    let remote = Rc::new(ScriptedRemote::new(sample::site()));
    let bus = EventBus::new();
    let state = EditorState::new(remote.clone(), EventSink::from_bus(&bus));
    (remote, state, bus)
}

fn of<E: crate::core::event_bus::Event + Clone>(events: &[BoxedEvent]) -> Vec<E> {
    events.iter().filter_map(|e| downcast_event::<E>(e).cloned()).collect()
}

type Log = Rc<RefCell<Vec<String>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

#[test]
fn test_getters_share_one_fetch() {
    let (remote, mut state, _bus) = setup();

    assert!(state.get_files(None).is_none());
    assert!(state.get_files(None).is_none());
    assert_eq!(remote.count("get_files"), 1);
    assert!(state.is_loading(&RequestKey::Files(state.workspace_generation())));

    remote.resolve("get_files");
    assert_eq!(state.pump(), 1);

    assert_eq!(state.files().map(<[_]>::len), Some(2));
    assert!(state.is_idle());

}

#[test]
fn test_ask_after_settle_starts_new_fetch() {
    let (remote, mut state, _bus) = setup();
    state.get_files(None);
    remote.resolve("get_files");
    state.pump();

    // Held value comes back right away while the listing is fetched again
    assert_eq!(state.get_files(None).map(<[_]>::len), Some(2));
    assert_eq!(remote.count("get_files"), 2);
    assert!(state.is_loading(&RequestKey::Files(state.workspace_generation())));
}

#[test]
fn test_callers_notified_in_order() {
    let (remote, mut state, _bus) = setup();
    let order = log();

    let o = Rc::clone(&order);
    state.get_project(Some(Then::new(move |_, p: &Project| o.borrow_mut().push(format!("first {}", p.name)))));
    let o = Rc::clone(&order);
    state.get_project(Some(Then::new(move |_, p: &Project| o.borrow_mut().push(format!("second {}", p.name)))));

    remote.resolve("get_project");
    state.pump();

    assert_eq!(*order.borrow(), vec!["first Docs".to_string(), "second Docs".to_string()]);
    assert_eq!(remote.count("get_project"), 1);
}

#[test]
fn test_then_waits_for_refetch() {
    let (remote, mut state, _bus) = setup();
    state.get_devices(None);
    remote.resolve("get_devices");
    state.pump();

    let seen = log();
    let s = Rc::clone(&seen);
    let held = state
        .get_devices(Some(Then::new(move |_, d: &Vec<Device>| s.borrow_mut().push(d[0].id.clone()))))
        .map(<[_]>::len);
    assert_eq!(held, Some(1));
    assert!(seen.borrow().is_empty());

    remote.resolve("get_devices");
    state.pump();
    assert_eq!(*seen.borrow(), vec!["phone".to_string()]);
    assert_eq!(remote.count("get_devices"), 2);
}

#[test]
fn test_refetch_from_continuation_starts_new_call() {
    let (remote, mut state, _bus) = setup();

    state.get_users(Some(Then::new(|state: &mut EditorState, _| {
        state.invalidate(ResourceKind::Users);
        state.get_users(None);
    })));
    remote.resolve("get_users");
    state.pump();

    assert_eq!(remote.count("get_users"), 2);
    assert!(state.is_loading(&RequestKey::Users));

    remote.resolve("get_users");
    state.pump();
    assert_eq!(state.users().map(|u| u[0].name.as_str()), Some("Ada"));
}

#[test]
fn test_listeners_fire_after_callers() {
    let (remote, mut state, _bus) = setup();
    let order = log();

    let o = Rc::clone(&order);
    state.on(ResourceKind::Workspaces, move |r| {
        if let Resource::Workspaces(list) = r {
            o.borrow_mut().push(format!("listener {}", list.len()));
        }
    });
    let o = Rc::clone(&order);
    state.get_workspaces(Some(Then::new(move |_, list: &Vec<Workspace>| {
        o.borrow_mut().push(format!("then {}", list.len()));
    })));

    remote.resolve("get_workspaces");
    state.pump();
    assert_eq!(*order.borrow(), vec!["then 2".to_string(), "listener 2".to_string()]);
}

#[test]
fn test_listeners_skip_failures() {
    let (remote, mut state, _bus) = setup();
    let fired = log();
    let f = Rc::clone(&fired);
    let id = state.on(ResourceKind::Users, move |_| f.borrow_mut().push("users".into()));

    state.get_users(None);
    remote.fail("get_users", RemoteError::new("offline"));
    state.pump();
    assert!(fired.borrow().is_empty());

    state.get_users(None);
    remote.resolve("get_users");
    state.pump();
    assert_eq!(fired.borrow().len(), 1);

    assert!(state.off(id));
    state.get_users(None);
    remote.resolve("get_users");
    state.pump();
    assert_eq!(fired.borrow().len(), 1);
}

#[test]
fn test_error_callback_suppresses_announcement() {
    let (remote, mut state, bus) = setup();
    let errors = log();

    let e = Rc::clone(&errors);
    state.get_files(Some(
        Then::new(|_, _: &Vec<FileEntry>| panic!("must not resolve"))
            .or_else(move |_, err| e.borrow_mut().push(err.message.clone())),
    ));
    remote.fail("get_files", RemoteError::new("offline"));
    state.pump();

    assert_eq!(*errors.borrow(), vec!["offline".to_string()]);
    assert!(of::<Announcement>(&bus.poll()).is_empty());
    assert!(state.files().is_none());
}

#[test]
fn test_unhandled_error_announced_once() {
    let (remote, mut state, bus) = setup();
    state.get_files(None);
    state.get_files(None);
    remote.fail("get_files", RemoteError::new("offline"));
    state.pump();

    let announced = of::<Announcement>(&bus.poll());
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].0.message, "offline");
    assert!(!state.is_loading(&RequestKey::Files(state.workspace_generation())));
}

#[test]
fn test_load_file_tracks_loading_path() {
    let (remote, mut state, bus) = setup();

    state.load_file(ABOUT, None);
    assert_eq!(state.loading_file_path(), Some(ABOUT));
    assert!(state.file().is_none());

    remote.resolve("get_file");
    state.pump();

    assert_eq!(state.loading_file_path(), None);
    let file = state.file().unwrap();
    assert_eq!(file.path, ABOUT);
    // Has its own preview URL, so no config fetch
    assert_eq!(file.preview_url.as_deref(), Some("https://example.com/about/"));
    assert_eq!(remote.count("get_project"), 0);

    let loaded = of::<FileLoaded>(&bus.poll());
    assert_eq!(loaded, vec![FileLoaded { path: ABOUT.into() }]);
}

#[test]
fn test_stale_file_load_dropped() {
    let (remote, mut state, bus) = setup();

    state.load_file(HELLO, None);
    state.load_file(ABOUT, None);
    assert_eq!(remote.parked(), vec!["get_file", "get_file"]);

    // Older load lands first: ignored
    remote.resolve("get_file");
    state.pump();
    assert!(state.file().is_none());
    assert_eq!(state.loading_file_path(), Some(ABOUT));

    remote.resolve("get_file");
    state.pump();
    assert_eq!(state.file().map(|f| f.path.as_str()), Some(ABOUT));

    let loaded = of::<FileLoaded>(&bus.poll());
    assert_eq!(loaded, vec![FileLoaded { path: ABOUT.into() }]);
    // The stale load never started a preview chain
    assert_eq!(remote.count("get_project"), 0);
}

#[test]
fn test_load_failure_clears_loading_and_announces() {
    let (remote, mut state, bus) = setup();

    state.load_file("content/missing.md", None);
    remote.resolve("get_file");
    state.pump();

    assert!(state.loading_file_path().is_none());
    assert!(state.file().is_none());
    let announced = of::<Announcement>(&bus.poll());
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].0.error_code.as_deref(), Some("not_found"));
}

#[test]
fn test_preview_url_resolved_through_chain() {
    let (remote, mut state, _bus) = setup();

    state.load_file(HELLO, None);
    remote.resolve("get_file");
    state.pump();
    assert_eq!(remote.parked(), vec!["get_project"]);

    remote.resolve("get_project");
    state.pump();
    assert_eq!(remote.parked(), vec!["get_workspace"]);

    remote.resolve("get_workspace");
    state.pump();
    assert_eq!(remote.parked(), vec!["get_preview_config"]);

    remote.resolve("get_preview_config");
    state.pump();

    assert_eq!(
        state.file().and_then(|f| f.preview_url.as_deref()),
        Some("https://staging.example.com/blog/hello/")
    );
    assert!(state.preview_config().is_some());
    assert!(state.is_idle());
}

#[test]
fn test_preview_url_dropped_after_file_change() {
    let (remote, mut state, _bus) = setup();

    state.load_file(HELLO, None);
    remote.resolve("get_file");
    state.pump();

    state.load_file(ABOUT, None);
    remote.resolve("get_file");
    state.pump();

    while !remote.parked().is_empty() {
        remote.resolve_all();
        state.pump();
    }

    let file = state.file().unwrap();
    assert_eq!(file.path, ABOUT);
    assert_eq!(file.preview_url.as_deref(), Some("https://example.com/about/"));
}

#[test]
fn test_preview_dependency_failure_reaches_caller() {
    let (remote, mut state, bus) = setup();
    let errors = log();

    let e = Rc::clone(&errors);
    state.get_preview_config(Some(
        Then::new(|_, _: &PreviewConfig| panic!("must not resolve"))
            .or_else(move |_, err| e.borrow_mut().push(err.message.clone())),
    ));
    remote.fail("get_project", RemoteError::new("offline"));
    state.pump();

    let e = Rc::clone(&errors);
    state.get_preview_config(Some(
        Then::new(|_, _: &PreviewConfig| panic!("must not resolve"))
            .or_else(move |_, err| e.borrow_mut().push(err.message.clone())),
    ));
    remote.resolve("get_project");
    state.pump();
    remote.fail("get_workspace", RemoteError::new("no branch"));
    state.pump();

    assert_eq!(*errors.borrow(), vec!["offline".to_string(), "no branch".to_string()]);
    assert!(of::<Announcement>(&bus.poll()).is_empty());
    assert!(state.is_idle());
}

#[test]
fn test_preview_without_target_reported_to_caller() {
    let (remote, mut state, bus) = setup();
    remote.site.borrow_mut().project.preview = None;
    let codes = log();

    let c = Rc::clone(&codes);
    state.get_preview_config(Some(
        Then::new(|_, _: &PreviewConfig| panic!("must not resolve"))
            .or_else(move |_, err| c.borrow_mut().push(err.error_code.clone().unwrap_or_default())),
    ));
    remote.resolve("get_project");
    state.pump();

    assert_eq!(*codes.borrow(), vec![preview::NO_PREVIEW_TARGET.to_string()]);
    assert_eq!(remote.count("get_preview_config"), 0);
    assert!(of::<Announcement>(&bus.poll()).is_empty());

    // Without an error callback nothing is reported
    assert!(state.get_preview_config(None).is_none());
    assert!(state.is_idle());
}

#[test]
fn test_save_updates_current_file() {
    let (remote, mut state, bus) = setup();

    state.load_file(HELLO, None);
    remote.resolve("get_file");
    state.pump();

    let mut edited = state.file().cloned().unwrap();
    edited.body = "Edited".into();
    assert!(state.save_file(&edited, false, None));
    assert!(!state.save_file(&edited, false, None));
    assert_eq!(remote.count("save_file"), 1);

    remote.resolve("save_file");
    state.pump();

    assert_eq!(state.file().map(|f| f.body.as_str()), Some("Edited"));
    assert_eq!(remote.site.borrow().file(HELLO).unwrap().body, "Edited");
    let saved = of::<FileSaved>(&bus.poll());
    assert_eq!(saved, vec![FileSaved { path: HELLO.into() }]);
}

#[test]
fn test_switch_workspace_resets_and_refetches() {
    let (remote, mut state, _bus) = setup();

    state.get_files(None);
    remote.resolve("get_files");
    state.pump();
    state.load_file(ABOUT, None);
    remote.resolve("get_file");
    state.pump();

    let before = state.workspace_generation();
    state.switch_workspace("draft", None);
    remote.resolve("checkout_workspace");
    state.pump();

    assert_eq!(state.workspace().map(|w| w.name.as_str()), Some("draft"));
    assert_ne!(state.workspace_generation(), before);
    assert!(state.file().is_none());
    assert!(state.files().is_none());
    assert_eq!(remote.count("get_files"), 2);

    remote.resolve("get_files");
    state.pump();
    let files = state.files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "content/posts/draft.md");
}

#[test]
fn test_listing_from_previous_workspace_dropped() {
    let (remote, mut state, _bus) = setup();

    state.get_files(None);
    state.switch_workspace("draft", None);
    remote.resolve("checkout_workspace");
    state.pump();
    assert_eq!(remote.parked(), vec!["get_files", "get_files"]);

    // Listing issued under "main" lands after the switch
    remote.resolve("get_files");
    state.pump();
    assert!(state.files().is_none());

    remote.resolve("get_files");
    state.pump();
    assert_eq!(state.files().map(<[_]>::len), Some(1));
}

#[test]
fn test_failed_checkout_keeps_workspace() {
    let (remote, mut state, bus) = setup();
    state.get_workspace(None);
    remote.resolve("get_workspace");
    state.pump();

    let before = state.workspace_generation();
    state.switch_workspace("nope", None);
    remote.resolve("checkout_workspace");
    state.pump();

    assert_eq!(state.workspace().map(|w| w.name.as_str()), Some("main"));
    assert_eq!(state.workspace_generation(), before);
    assert_eq!(of::<Announcement>(&bus.poll()).len(), 1);
}
