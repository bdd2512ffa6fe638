//! Ordered list field with lock cycles.
//!
//! Every structural edit opens a lock cycle: the items whose position changed
//! are locked, the field as a whole is locked, and a [`LockToken`] is returned.
//! `settle(token)` closes the cycle. Once no cycle is open, a value assigned
//! while locked is applied and the field is back to plain two-way sync.

use anyhow::{Result, bail};
use log::{debug, trace};
use std::fmt;

use super::{ItemId, ListItem, LockToken};
use crate::core::editor_events::RenderRequested;
use crate::core::event_bus::EventSink;

struct LockCycle {
    token: LockToken,
    items: Vec<ItemId>,
}

pub struct ListField<V> {
    name: String,
    /// Authoritative value, as last assigned from outside
    value: Vec<V>,
    blank: V,
    /// `None` until first read
    items: Option<Vec<ListItem<V>>>,
    cycles: Vec<LockCycle>,
    /// A value arrived while locked and has not been applied to `items` yet
    deferred: bool,
    validator: Option<fn(&V) -> bool>,
    signals: EventSink,
}

impl<V: fmt::Debug> fmt::Debug for ListField<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListField")
            .field("name", &self.name)
            .field("value", &self.value.len())
            .field("items", &self.items.as_ref().map(Vec::len))
            .field("cycles", &self.cycles.len())
            .field("deferred", &self.deferred)
            .finish()
    }
}

impl<V: Clone + PartialEq + fmt::Debug> ListField<V> {
    pub fn new(name: impl Into<String>, value: Vec<V>, blank: V) -> Self {
        Self {
            name: name.into(),
            value,
            blank,
            items: None,
            cycles: Vec::new(),
            deferred: false,
            validator: None,
            signals: EventSink::dummy(),
        }
    }

    pub fn with_validator(mut self, validator: fn(&V) -> bool) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_signals(mut self, signals: EventSink) -> Self {
        self.signals = signals;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ========== Reads ==========

    /// Items, materialized from the authoritative value on first call.
    pub fn items(&mut self) -> &[ListItem<V>] {
        self.materialize()
    }

    /// Items if already materialized
    pub fn peek_items(&self) -> Option<&[ListItem<V>]> {
        self.items.as_deref()
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut ListItem<V>> {
        self.materialize().iter_mut().find(|item| item.id() == id)
    }

    /// Current value: item values once materialized, else the authoritative one.
    pub fn value(&self) -> Vec<V> {
        match &self.items {
            Some(items) => items.iter().map(|item| item.value().clone()).collect(),
            None => self.value.clone(),
        }
    }

    pub fn authoritative(&self) -> &[V] {
        &self.value
    }

    pub fn len(&self) -> usize {
        match &self.items {
            Some(items) => items.len(),
            None => self.value.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_locked(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Tokens of every open lock cycle, oldest first.
    pub fn outstanding(&self) -> Vec<LockToken> {
        self.cycles.iter().map(|c| c.token).collect()
    }

    /// Clean iff never materialized, or unlocked with every item clean and
    /// the same length as the authoritative value. Locked always reads dirty.
    pub fn is_clean(&self) -> bool {
        match &self.items {
            None => true,
            Some(items) => {
                !self.is_locked()
                    && items.len() == self.value.len()
                    && items.iter().all(|item| !item.is_dirty())
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        let Some(validator) = self.validator else {
            return true;
        };
        match &self.items {
            Some(items) => items.iter().all(|item| validator(item.value())),
            None => self.value.iter().all(validator),
        }
    }

    pub fn is_item_valid(&self, item: &ListItem<V>) -> bool {
        self.validator.is_none_or(|validator| validator(item.value()))
    }

    // ========== Authoritative value ==========

    /// Assign a fresh authoritative value.
    ///
    /// Unlocked: items follow it by position (ids and expansion kept).
    /// Locked: stored only; applied when the last cycle settles.
    pub fn set_value(&mut self, value: Vec<V>) {
        self.value = value;
        if self.is_locked() {
            debug!("{}: locked, deferring {} item(s)", self.name, self.value.len());
            self.deferred = true;
            return;
        }
        self.sync_items();
        self.render();
    }

    /// Drop items and every lock cycle, then take `value`.
    pub fn reset(&mut self, value: Vec<V>) {
        if !self.cycles.is_empty() {
            debug!("{}: reset drops {} open lock cycle(s)", self.name, self.cycles.len());
        }
        self.value = value;
        self.items = None;
        self.cycles.clear();
        self.deferred = false;
        self.render();
    }

    // ========== Structural edits ==========

    /// Insert a blank item at `index` (append if `None`).
    pub fn handle_insert_item(&mut self, index: Option<usize>) -> Result<LockToken> {
        let blank = self.blank.clone();
        let name = self.name.clone();
        let items = self.materialize_mut();
        let index = index.unwrap_or(items.len());
        if index > items.len() {
            bail!("{}: insert index {} out of range ({} items)", name, index, items.len());
        }
        items.insert(index, ListItem::new(blank));
        trace!("{}: inserted at {}", name, index);
        Ok(self.lock_from(index))
    }

    pub fn handle_delete_item(&mut self, index: usize) -> Result<LockToken> {
        let name = self.name.clone();
        let items = self.materialize_mut();
        if index >= items.len() {
            bail!("{}: delete index {} out of range ({} items)", name, index, items.len());
        }
        items.remove(index);
        trace!("{}: deleted {}", name, index);
        Ok(self.lock_from(index))
    }

    /// Copy the item at `index` in right after it. The source and everything
    /// after it are locked.
    pub fn handle_duplicate_item(&mut self, index: usize) -> Result<LockToken> {
        let name = self.name.clone();
        let items = self.materialize_mut();
        let Some(source) = items.get(index) else {
            bail!("{}: duplicate index {} out of range ({} items)", name, index, items.len());
        };
        let copy = ListItem::new(source.value().clone());
        items.insert(index + 1, copy);
        trace!("{}: duplicated {}", name, index);
        Ok(self.lock_from(index))
    }

    /// Move the item at `start` to `end`, shifting the span between.
    ///
    /// `start == end` changes nothing and opens no cycle.
    pub fn handle_sort(&mut self, start: usize, end: usize) -> Result<Option<LockToken>> {
        let name = self.name.clone();
        let items = self.materialize_mut();
        let len = items.len();
        if start >= len || end >= len {
            bail!("{}: sort {} -> {} out of range ({} items)", name, start, end, len);
        }
        if start == end {
            return Ok(None);
        }

        let (lo, hi) = (start.min(end), start.max(end));
        let source_of = |i: usize| {
            if i < lo || i > hi {
                i
            } else if i == end {
                start
            } else if start < end {
                i + 1
            } else {
                i - 1
            }
        };

        let mut slots: Vec<Option<ListItem<V>>> = std::mem::take(items).into_iter().map(Some).collect();
        *items = (0..len).filter_map(|i| slots[source_of(i)].take()).collect();
        trace!("{}: sorted {} -> {}", name, start, end);

        let ids = items[lo..=hi].iter().map(ListItem::id).collect();
        Ok(Some(self.lock(ids)))
    }

    // ========== Expansion ==========

    /// Expand `id`, collapsing every sibling. Not a structural edit.
    pub fn expand_item(&mut self, id: ItemId) -> bool {
        let items = self.materialize_mut();
        if !items.iter().any(|item| item.id() == id) {
            return false;
        }
        for item in items.iter_mut() {
            item.is_expanded = item.id() == id;
        }
        self.render();
        true
    }

    pub fn collapse_all(&mut self) {
        for item in self.materialize_mut().iter_mut() {
            item.is_expanded = false;
        }
        self.render();
    }

    pub fn expanded(&self) -> Option<ItemId> {
        self.items.as_ref()?.iter().find(|item| item.is_expanded()).map(ListItem::id)
    }

    // ========== Settle ==========

    /// Close the cycle for `token`. Unknown tokens are ignored.
    pub fn settle(&mut self, token: LockToken) -> bool {
        let Some(pos) = self.cycles.iter().position(|c| c.token == token) else {
            trace!("{}: ignoring unknown {}", self.name, token);
            return false;
        };
        self.cycles.remove(pos);
        self.refresh_locks();

        if self.cycles.is_empty() && self.deferred {
            debug!("{}: unlocked, applying deferred value", self.name);
            self.deferred = false;
            self.sync_items();
        }
        self.render();
        true
    }

    // ========== Internals ==========

    fn materialize(&mut self) -> &mut Vec<ListItem<V>> {
        self.items
            .get_or_insert_with(|| self.value.iter().cloned().map(ListItem::new).collect())
    }

    fn materialize_mut(&mut self) -> &mut Vec<ListItem<V>> {
        self.materialize()
    }

    /// Positional sync from the authoritative value. Skipped if never materialized.
    fn sync_items(&mut self) {
        let Some(items) = self.items.as_mut() else {
            return;
        };
        items.truncate(self.value.len());
        for (i, value) in self.value.iter().enumerate() {
            match items.get_mut(i) {
                Some(item) => item.reset(value.clone()),
                None => items.push(ListItem::new(value.clone())),
            }
        }
    }

    fn lock_from(&mut self, index: usize) -> LockToken {
        let ids = self
            .items
            .as_deref()
            .unwrap_or_default()
            .iter()
            .skip(index)
            .map(ListItem::id)
            .collect();
        self.lock(ids)
    }

    fn lock(&mut self, ids: Vec<ItemId>) -> LockToken {
        let token = LockToken::new();
        debug!("{}: {} locks {} item(s)", self.name, token, ids.len());
        self.cycles.push(LockCycle { token, items: ids });
        self.refresh_locks();
        self.render();
        token
    }

    /// An item is locked iff some open cycle holds it.
    fn refresh_locks(&mut self) {
        let cycles = &self.cycles;
        if let Some(items) = self.items.as_mut() {
            for item in items.iter_mut() {
                item.is_locked = cycles.iter().any(|c| c.items.contains(&item.id()));
            }
        }
    }

    fn render(&self) {
        self.signals.emit(RenderRequested);
    }
}
