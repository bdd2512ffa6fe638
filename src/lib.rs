//! QUILL - content editor core library
//!
//! Re-exports all modules for use by the binary target.

// Core engine (listeners, request cache, events, workers)
pub mod core;

// Editor modules
pub mod cli;
pub mod config;
pub mod editor;
pub mod entities;
pub mod fields;
pub mod remote;

// Re-export commonly used types from core
pub use core::event_bus::{BoxedEvent, EventBus, EventSink, downcast_event};
pub use core::request_cache::RequestCache;

// Re-export the editor surface
pub use editor::{EditorState, RequestKey, Resource, ResourceKind, Then};
pub use fields::{EditorForm, ListField, ListKind, LockToken};
pub use remote::{RemoteApi, RemoteError};
