use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    error::FetchError,
    types::{CacheEntry, EntryStatus, Generation, RequestKey},
};

use super::Subscription;

pub type Listener<V> = Arc<dyn Fn(&CacheEntry<V>) + Send + Sync>;

type Notification<V> = (Vec<Listener<V>>, CacheEntry<V>);

struct Slot<V> {
    entry: Option<CacheEntry<V>>,
    listeners: Vec<(u64, Listener<V>)>,
    /// Generation of the most recently started fetch for this key.
    generation: Generation,
    touched_at: Instant,
}

impl<V: Clone> Slot<V> {
    fn new(now: Instant) -> Self {
        Self {
            entry: None,
            listeners: Vec::new(),
            generation: Generation::ZERO,
            touched_at: now,
        }
    }

    fn listeners(&self) -> Vec<Listener<V>> {
        self.listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

struct Inner<V> {
    slots: HashMap<RequestKey, Slot<V>>,
    last_generation: Generation,
    next_listener: u64,
}

/// Keyed store of request results with per-key subscribers.
///
/// Every transition happens inside one short critical section; listeners are
/// invoked synchronously afterwards, outside the lock, with a snapshot of the
/// entry they are told about.
pub struct CacheStore<V> {
    inner: Mutex<Inner<V>>,
    retention: Duration,
}

impl<V> CacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                last_generation: Generation::ZERO,
                next_listener: 0,
            }),
            retention,
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<CacheEntry<V>> {
        self.inner
            .lock()
            .slots
            .get(key)
            .and_then(|slot| slot.entry.clone())
    }

    pub fn put(&self, key: RequestKey, mut entry: CacheEntry<V>) {
        let notification = {
            let mut inner = self.inner.lock();
            let now = Instant::now();
            let slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(now));
            entry.key = key;
            entry.subscriber_count = slot.listeners.len();
            slot.touched_at = now;
            slot.entry = Some(entry.clone());
            (slot.listeners(), entry)
        };
        notify(notification);
    }

    pub fn subscribe<F>(self: &Arc<Self>, key: RequestKey, listener: F) -> Subscription
    where
        F: Fn(&CacheEntry<V>) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.inner.lock();
            inner.next_listener += 1;
            let id = inner.next_listener;
            let slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(Instant::now()));
            slot.listeners.push((id, Arc::new(listener)));
            let count = slot.listeners.len();
            if let Some(entry) = slot.entry.as_mut() {
                entry.subscriber_count = count;
            }
            id
        };

        let store = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(store) = store.upgrade() {
                store.release(&key, id);
            }
        })
    }

    pub fn subscriber_count(&self, key: &RequestKey) -> usize {
        self.inner
            .lock()
            .slots
            .get(key)
            .map_or(0, |slot| slot.listeners.len())
    }

    /// Flags every matching entry for refetch without dropping its data.
    /// Returns how many entries were flagged.
    pub fn invalidate<P>(&self, predicate: P) -> usize
    where
        P: Fn(&RequestKey) -> bool,
    {
        let notifications: Vec<Notification<V>> = {
            let mut inner = self.inner.lock();
            inner
                .slots
                .iter_mut()
                .filter(|(key, _)| predicate(*key))
                .filter_map(|(_, slot)| {
                    let listeners = slot.listeners();
                    let entry = slot.entry.as_mut()?;
                    entry.stale_after = Duration::ZERO;
                    entry.invalidated = true;
                    Some((listeners, entry.clone()))
                })
                .collect()
        };

        let count = notifications.len();
        for notification in notifications {
            debug!(key = %notification.1.key, "invalidated cache entry");
            notify(notification);
        }
        count
    }

    /// Marks `key` pending and issues it a fresh generation, atomically.
    pub fn begin_fetch(&self, key: &RequestKey, stale_after: Duration) -> Generation {
        let (generation, notification) = {
            let mut inner = self.inner.lock();
            let generation = inner.last_generation.next();
            inner.last_generation = generation;

            let now = Instant::now();
            let slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(now));
            slot.generation = generation;
            slot.touched_at = now;

            let listeners = slot.listeners();
            let subscribers = listeners.len();
            let entry = slot
                .entry
                .get_or_insert_with(|| CacheEntry::pending(key.clone(), stale_after));
            entry.status = EntryStatus::Pending;
            entry.invalidated = false;
            entry.subscriber_count = subscribers;
            let notification = (listeners, entry.clone());

            sweep(&mut inner.slots, now, self.retention);
            (generation, notification)
        };

        notify(notification);
        generation
    }

    pub fn current_generation(&self, key: &RequestKey) -> Option<Generation> {
        self.inner.lock().slots.get(key).map(|slot| slot.generation)
    }

    /// Stores the outcome of the fetch issued `generation`, unless a newer
    /// fetch has started for the key since. Returns the committed entry.
    ///
    /// A failure keeps the previous value. An invalidation that arrived while
    /// the fetch was running stays in force, so the committed value is still
    /// refetched on the next read.
    pub fn commit(
        &self,
        key: &RequestKey,
        generation: Generation,
        outcome: Result<V, FetchError>,
        stale_after: Duration,
    ) -> Option<CacheEntry<V>> {
        let notification = {
            let mut inner = self.inner.lock();
            let slot = inner.slots.get_mut(key)?;
            if slot.generation != generation {
                return None;
            }

            let now = Instant::now();
            slot.touched_at = now;
            let listeners = slot.listeners();
            let subscribers = listeners.len();
            let entry = slot
                .entry
                .get_or_insert_with(|| CacheEntry::pending(key.clone(), stale_after));
            match outcome {
                Ok(value) => {
                    entry.status = EntryStatus::Success;
                    entry.value = Some(value);
                    entry.error = None;
                    entry.fetched_at = Some(now);
                    entry.generation = generation;
                    if !entry.invalidated {
                        entry.stale_after = stale_after;
                    }
                }
                Err(error) => {
                    entry.status = EntryStatus::Error;
                    entry.error = Some(error);
                }
            }
            entry.subscriber_count = subscribers;
            (listeners, entry.clone())
        };

        let committed = notification.1.clone();
        notify(notification);
        Some(committed)
    }

    /// Evicts entries nobody observes, with no fetch pending, that have been
    /// idle for at least the retention window. Every [`begin_fetch`] also
    /// runs this sweep.
    ///
    /// [`begin_fetch`]: Self::begin_fetch
    pub fn collect_garbage(&self) -> usize {
        let mut inner = self.inner.lock();
        sweep(&mut inner.slots, Instant::now(), self.retention)
    }

    /// Drops every entry and listener. Outstanding subscriptions become no-ops
    /// and in-flight fetches can no longer commit.
    pub fn clear(&self) {
        self.inner.lock().slots.clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .slots
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &RequestKey, id: u64) {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slots.get_mut(key) else {
            return;
        };
        slot.listeners.retain(|(listener_id, _)| *listener_id != id);
        let count = slot.listeners.len();
        if let Some(entry) = slot.entry.as_mut() {
            entry.subscriber_count = count;
        }
        if count == 0 {
            slot.touched_at = Instant::now();
        }
    }
}

fn sweep<V>(slots: &mut HashMap<RequestKey, Slot<V>>, now: Instant, retention: Duration) -> usize {
    let before = slots.len();
    slots.retain(|key, slot| {
        let pending = slot.entry.as_ref().is_some_and(CacheEntry::is_pending);
        let keep = !slot.listeners.is_empty()
            || pending
            || now.saturating_duration_since(slot.touched_at) < retention;
        if !keep {
            debug!(%key, "evicting idle cache entry");
        }
        keep
    });
    before - slots.len()
}

fn notify<V>((listeners, entry): Notification<V>) {
    for listener in &listeners {
        listener(&entry);
    }
}
