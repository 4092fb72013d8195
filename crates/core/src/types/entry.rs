use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::FetchError;

use super::key::RequestKey;

/// Monotonic fetch counter. Unique across the whole store, so a generation
/// can never be reissued for a key even after its entry is evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub const ZERO: Self = Self(0);

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryStatus {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: RequestKey,
    pub status: EntryStatus,
    /// Last successfully fetched value. Survives refetches and failures.
    pub value: Option<V>,
    pub error: Option<FetchError>,
    pub fetched_at: Option<Instant>,
    pub stale_after: Duration,
    pub subscriber_count: usize,
    /// Set by invalidation; cleared when a new fetch begins.
    pub invalidated: bool,
    /// Generation of the fetch that produced `value`.
    pub generation: Generation,
}

impl<V> CacheEntry<V> {
    pub fn pending(key: RequestKey, stale_after: Duration) -> Self {
        Self {
            key,
            status: EntryStatus::Pending,
            value: None,
            error: None,
            fetched_at: None,
            stale_after,
            subscriber_count: 0,
            invalidated: false,
            generation: Generation::ZERO,
        }
    }

    pub fn success(key: RequestKey, value: V, stale_after: Duration) -> Self {
        Self {
            status: EntryStatus::Success,
            value: Some(value),
            fetched_at: Some(Instant::now()),
            ..Self::pending(key, stale_after)
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }

    /// Stale once `now - fetched_at >= stale_after`, or when invalidated.
    pub fn is_stale_at(&self, now: Instant) -> bool {
        if self.invalidated {
            return true;
        }
        match self.fetched_at {
            Some(fetched_at) => now.saturating_duration_since(fetched_at) >= self.stale_after,
            None => true,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }
}
