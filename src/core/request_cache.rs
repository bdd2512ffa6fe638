//! Single-flight request cache.
//!
//! Collapses concurrent asks for the same resource into one remote operation:
//! - First `request(key, ..)` creates an entry and calls `start` with a [`Responder`]
//! - Later asks while the entry exists only append a [`Waiter`]
//! - The remote side answers through the responder, from any thread
//! - The owning thread drains answers with `next_settled()` / `wait_settled()`
//!   and runs them with [`Settled::dispatch`]
//!
//! On settlement the entry is removed FIRST, so a waiter that re-requests the
//! same key starts a fresh operation instead of replaying this one. Waiters
//! then run in registration order. `dispatch` hands a resolved value back so
//! the owner can fire its listeners after every waiter has seen it.
//!
//! **Used by**: EditorState (one cache for every tracked resource)

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use super::editor_events::Announcement;
use super::event_bus::EventSink;
use crate::remote::RemoteError;

/// Identity of one started operation. Distinguishes a fresh entry from a
/// previous one for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Entry progress. `Claimed` covers the window while `start` is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Claimed,
    Started,
}

type OnSettle<C, V> = Box<dyn FnOnce(&mut C, &V)>;
type OnError<C> = Box<dyn FnOnce(&mut C, &RemoteError)>;

/// Continuation registered against an in-flight key. Runs at most once.
pub struct Waiter<C, V> {
    on_settle: Option<OnSettle<C, V>>,
    on_error: Option<OnError<C>>,
}

impl<C, V> Waiter<C, V> {
    /// Waiter that runs `f` with the resolved value.
    pub fn then<F>(f: F) -> Self
    where
        F: FnOnce(&mut C, &V) + 'static,
    {
        Self {
            on_settle: Some(Box::new(f)),
            on_error: None,
        }
    }

    /// Waiter that only cares about failure.
    pub fn on_error<F>(f: F) -> Self
    where
        F: FnOnce(&mut C, &RemoteError) + 'static,
    {
        Self {
            on_settle: None,
            on_error: Some(Box::new(f)),
        }
    }

    /// Attach an error callback. Without one, failure is announced.
    pub fn or_else<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut C, &RemoteError) + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn handles_errors(&self) -> bool {
        self.on_error.is_some()
    }
}

impl<C, V> fmt::Debug for Waiter<C, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("on_settle", &self.on_settle.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

struct Entry<C, V> {
    ticket: Ticket,
    pending: Pending,
    waiters: Vec<Waiter<C, V>>,
}

struct Settlement<K, V> {
    key: K,
    ticket: Ticket,
    result: Result<V, RemoteError>,
}

/// Reply handle given to the remote side. `Send` whenever K and V are.
///
/// Dropping it without answering rejects the request, so a lost reply
/// never wedges its key.
pub struct Responder<K, V> {
    key: Option<K>,
    ticket: Ticket,
    tx: Sender<Settlement<K, V>>,
}

impl<K, V> Responder<K, V> {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn resolve(self, value: V) {
        self.settle(Ok(value));
    }

    pub fn reject(self, err: RemoteError) {
        self.settle(Err(err));
    }

    pub fn settle(mut self, result: Result<V, RemoteError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<V, RemoteError>) {
        let Some(key) = self.key.take() else {
            return;
        };
        let settlement = Settlement {
            key,
            ticket: self.ticket,
            result,
        };
        if self.tx.send(settlement).is_err() {
            trace!("Request cache gone, dropping settlement for {:?}", self.ticket);
        }
    }
}

impl<K, V> Drop for Responder<K, V> {
    fn drop(&mut self) {
        if self.key.is_some() {
            debug!("Responder {:?} dropped unanswered, rejecting", self.ticket);
            self.send(Err(RemoteError::dropped()));
        }
    }
}

impl<K, V> fmt::Debug for Responder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("ticket", &self.ticket)
            .field("answered", &self.key.is_none())
            .finish()
    }
}

/// A settled operation whose entry is already purged from the cache.
///
/// Holds the waiters collected while it was in flight; `dispatch()` runs them.
pub struct Settled<K, V, C> {
    key: K,
    result: Result<V, RemoteError>,
    waiters: Vec<Waiter<C, V>>,
    announce: EventSink,
}

impl<K, V, C> Settled<K, V, C>
where
    K: fmt::Debug,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn result(&self) -> Result<&V, &RemoteError> {
        self.result.as_ref()
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Run waiters against `ctx` in registration order.
    ///
    /// Success returns `(key, value)` so the caller can fire listeners after
    /// every waiter has seen the value. Failure goes to each waiter's error
    /// callback; if any waiter had none (or nobody waited) it is announced once.
    pub fn dispatch(self, ctx: &mut C) -> Option<(K, V)> {
        match self.result {
            Ok(value) => {
                trace!("{:?} resolved, {} waiter(s)", self.key, self.waiters.len());
                for waiter in self.waiters {
                    if let Some(f) = waiter.on_settle {
                        f(ctx, &value);
                    }
                }
                Some((self.key, value))
            }
            Err(err) => {
                debug!("{:?} rejected: {}", self.key, err);
                let mut unhandled = self.waiters.is_empty();
                for waiter in self.waiters {
                    match waiter.on_error {
                        Some(f) => f(ctx, &err),
                        None => unhandled = true,
                    }
                }
                if unhandled {
                    announce(&self.announce, &err);
                }
                None
            }
        }
    }
}

/// Forward an unhandled remote failure to the announce sink.
pub fn announce(sink: &EventSink, err: &RemoteError) {
    warn!("Unhandled remote error: {}", err);
    sink.emit(Announcement(err.clone()));
}

/// Deduplicating cache of in-flight remote operations.
///
/// `K` is a closed key type, `V` the resolved value, `C` the context
/// continuations receive as `&mut C`.
pub struct RequestCache<K, V, C> {
    entries: HashMap<K, Entry<C, V>>,
    tx: Sender<Settlement<K, V>>,
    rx: Receiver<Settlement<K, V>>,
    next_ticket: u64,
    announce: EventSink,
}

impl<K, V, C> fmt::Debug for RequestCache<K, V, C>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("in_flight", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K, V, C> RequestCache<K, V, C>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new(announce: EventSink) -> Self {
        let (tx, rx) = unbounded();
        Self {
            entries: HashMap::new(),
            tx,
            rx,
            next_ticket: 0,
            announce,
        }
    }

    // ========== Requests ==========

    /// Ask for `key`.
    ///
    /// If the key is already in flight, `waiter` joins it and `start` is not
    /// called. Otherwise a new entry is claimed and `start` receives the
    /// responder. Returns true if this call started the operation.
    pub fn request<F>(&mut self, key: K, start: F, waiter: Option<Waiter<C, V>>) -> bool
    where
        F: FnOnce(Responder<K, V>),
    {
        if let Some(entry) = self.entries.get_mut(&key) {
            if let Some(waiter) = waiter {
                entry.waiters.push(waiter);
            }
            trace!("{:?} already in flight ({:?}), joined", key, entry.ticket);
            return false;
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.entries.insert(
            key.clone(),
            Entry {
                ticket,
                pending: Pending::Claimed,
                waiters: waiter.into_iter().collect(),
            },
        );

        debug!("{:?} started ({:?})", key, ticket);
        start(Responder {
            key: Some(key.clone()),
            ticket,
            tx: self.tx.clone(),
        });

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.pending = Pending::Started;
        }
        true
    }

    /// True iff an operation for `key` is outstanding.
    pub fn in_progress(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn pending(&self, key: &K) -> Option<Pending> {
        self.entries.get(key).map(|e| e.pending)
    }

    /// Number of outstanding operations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ========== Settlement ==========

    /// Take the next settled operation without blocking.
    pub fn next_settled(&mut self) -> Option<Settled<K, V, C>> {
        while let Ok(settlement) = self.rx.try_recv() {
            if let Some(settled) = self.accept(settlement) {
                return Some(settled);
            }
        }
        None
    }

    /// Block up to `timeout` for the next settled operation.
    pub fn wait_settled(&mut self, timeout: Duration) -> Option<Settled<K, V, C>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let settlement = self.rx.recv_timeout(remaining).ok()?;
            if let Some(settled) = self.accept(settlement) {
                return Some(settled);
            }
        }
    }

    fn accept(&mut self, settlement: Settlement<K, V>) -> Option<Settled<K, V, C>> {
        let current = self.entries.get(&settlement.key).map(|e| e.ticket);
        if current != Some(settlement.ticket) {
            warn!(
                "Dropping settlement for {:?}: {:?} is not the outstanding operation",
                settlement.key, settlement.ticket
            );
            return None;
        }

        let entry = self.entries.remove(&settlement.key)?;
        Some(Settled {
            key: settlement.key,
            result: settlement.result,
            waiters: entry.waiters,
            announce: self.announce.clone(),
        })
    }
}
