//! Named-event listener registry.
//!
//! A standalone emitter that other types hold as a field:
//! - `on(key, cb)` registers a callback for one event key
//! - `fire(key, args)` invokes every callback for that key in registration order
//!
//! Cross-key order is undefined. A panicking callback is logged and skipped,
//! remaining callbacks for the same key still run.

use log::error;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};

/// Handle returned by [`Listeners::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<A> = Box<dyn Fn(&A)>;

/// Listener registry keyed by `K`, passing `&A` to every callback.
pub struct Listeners<K, A> {
    callbacks: HashMap<K, Vec<(ListenerId, Callback<A>)>>,
    next_id: u64,
}

impl<K, A> Default for Listeners<K, A> {
    fn default() -> Self {
        Self {
            callbacks: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<K, A> fmt::Debug for Listeners<K, A>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, cbs) in &self.callbacks {
            map.entry(key, &cbs.len());
        }
        map.finish()
    }
}

impl<K, A> Listeners<K, A>
where
    K: Eq + Hash + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register callback for `key`. Callbacks run in registration order.
    pub fn on<F>(&mut self, key: K, callback: F) -> ListenerId
    where
        F: Fn(&A) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.callbacks
            .entry(key)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove a single callback. Returns false if it was not registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        for cbs in self.callbacks.values_mut() {
            if let Some(pos) = cbs.iter().position(|(cb_id, _)| *cb_id == id) {
                cbs.remove(pos);
                return true;
            }
        }
        false
    }

    /// Invoke every callback registered for `key`. Returns how many ran to completion.
    pub fn fire(&self, key: &K, args: &A) -> usize {
        let Some(cbs) = self.callbacks.get(key) else {
            return 0;
        };

        let mut completed = 0;
        for (id, cb) in cbs {
            match panic::catch_unwind(AssertUnwindSafe(|| cb(args))) {
                Ok(()) => completed += 1,
                Err(_) => error!("Listener {:?} for {:?} panicked, skipping", id, key),
            }
        }
        completed
    }

    /// Number of callbacks registered for `key`
    pub fn count(&self, key: &K) -> usize {
        self.callbacks.get(key).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.values().all(Vec::is_empty)
    }
}
