use std::{
    collections::{HashMap, hash_map},
    future::Future,
    sync::Arc,
};

use futures::{
    FutureExt,
    future::{self, BoxFuture, Shared},
};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    cache::CacheStore,
    error::{FetchError, Superseded},
    types::{CacheEntry, EntryStatus, Generation, RequestKey, StalenessPolicy},
};

pub type FetchOutput<V> = Result<CacheEntry<V>, Superseded>;

/// Shared handle to one fetch. Every clone resolves to the same outcome.
pub type FetchHandle<V> = Shared<BoxFuture<'static, FetchOutput<V>>>;

struct InFlight<V> {
    generation: Generation,
    handle: FetchHandle<V>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    Once,
    Never,
}

type InFlightMap<V> = Arc<Mutex<HashMap<RequestKey, InFlight<V>>>>;

/// Runs keyed fetches against a [`CacheStore`] with dedup, one retry for
/// transient failures, and generation-based supersession.
pub struct RequestCoordinator<V> {
    store: Arc<CacheStore<V>>,
    staleness: StalenessPolicy,
    in_flight: InFlightMap<V>,
}

impl<V> RequestCoordinator<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<CacheStore<V>>, staleness: StalenessPolicy) -> Self {
        Self {
            store,
            staleness,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore<V>> {
        &self.store
    }

    pub fn staleness(&self) -> &StalenessPolicy {
        &self.staleness
    }

    /// Reads `key` through the cache.
    ///
    /// A fresh value resolves immediately. A stale value also resolves
    /// immediately, and a background refresh is started unless one is
    /// already running. Without a value, callers join the fetch in flight
    /// for the key or start a new one.
    ///
    /// Background refreshes are spawned on the ambient tokio runtime.
    pub fn fetch<F, Fut>(&self, key: RequestKey, perform: F) -> FetchHandle<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let now = Instant::now();
        let cached = self.store.get(&key);

        let servable = cached
            .as_ref()
            .filter(|entry| entry.status != EntryStatus::Error && entry.value.is_some());
        if let Some(entry) = servable {
            if !entry.is_stale_at(now) {
                debug!(%key, "cache hit");
                return resolved(entry.clone());
            }
            if self.joinable(&key, entry).is_none() {
                debug!(%key, "serving stale entry, refreshing in background");
                tokio::spawn(self.start(key, perform, Retry::Once));
            }
            return resolved(entry.clone());
        }

        if let Some(handle) = cached
            .as_ref()
            .and_then(|entry| self.joinable(&key, entry))
        {
            debug!(%key, "joining in-flight fetch");
            return handle;
        }

        self.start(key, perform, Retry::Once)
    }

    /// Starts a new generation for `key` even if a fetch is already in
    /// flight; the older fetch's result will be discarded.
    pub fn refetch<F, Fut>(&self, key: RequestKey, perform: F) -> FetchHandle<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        self.start(key, perform, Retry::Once)
    }

    /// Like [`refetch`](Self::refetch), for callers that poll on a schedule:
    /// a transient failure is not retried here, the next poll retries it.
    pub fn poll<F, Fut>(&self, key: RequestKey, perform: F) -> FetchHandle<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        self.start(key, perform, Retry::Never)
    }

    /// Like [`fetch`](Self::fetch), but follows supersession: when the fetch
    /// joined is overtaken by a newer generation, the newer one is awaited.
    ///
    /// The first fetch is issued before this returns.
    pub fn fetch_latest<F, Fut>(
        self: &Arc<Self>,
        key: RequestKey,
        perform: F,
    ) -> BoxFuture<'static, CacheEntry<V>>
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let first = self.fetch(key.clone(), perform.clone());
        let this = Arc::clone(self);
        async move {
            let mut handle = first;
            loop {
                match handle.await {
                    Ok(entry) => return entry,
                    Err(Superseded) => {
                        debug!(%key, "fetch superseded, following newer generation");
                        handle = this.fetch(key.clone(), perform.clone());
                    }
                }
            }
        }
        .boxed()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Forgets every in-flight marker. Running fetches finish but can only
    /// commit if their generation is still current.
    pub fn clear_in_flight(&self) {
        self.in_flight.lock().clear();
    }

    fn joinable(&self, key: &RequestKey, entry: &CacheEntry<V>) -> Option<FetchHandle<V>> {
        if entry.invalidated {
            return None;
        }
        let current = self.store.current_generation(key)?;
        let in_flight = self.in_flight.lock();
        in_flight
            .get(key)
            .filter(|flight| flight.generation == current)
            .map(|flight| flight.handle.clone())
    }

    fn start<F, Fut>(&self, key: RequestKey, perform: F, retry: Retry) -> FetchHandle<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let stale_after = self.staleness.for_operation(key.operation());
        let generation = self.store.begin_fetch(&key, stale_after);
        debug!(%key, generation = generation.as_u64(), "starting fetch");

        let first_attempt = perform();
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let flight_key = key.clone();

        let handle = async move {
            let outcome = match first_attempt.await {
                Err(error) if retry == Retry::Once && error.is_retryable() => {
                    warn!(key = %flight_key, %error, "transient failure, retrying once");
                    perform().await
                }
                outcome => outcome,
            };

            let committed = store.commit(&flight_key, generation, outcome, stale_after);

            let mut flights = in_flight.lock();
            if flights
                .get(&flight_key)
                .is_some_and(|flight| flight.generation == generation)
            {
                flights.remove(&flight_key);
            }
            drop(flights);

            committed.ok_or_else(|| {
                debug!(key = %flight_key, generation = generation.as_u64(), "discarding superseded result");
                Superseded
            })
        }
        .boxed()
        .shared();

        let mut flights = self.in_flight.lock();
        match flights.entry(key) {
            hash_map::Entry::Occupied(mut occupied) => {
                if occupied.get().generation < generation {
                    occupied.insert(InFlight {
                        generation,
                        handle: handle.clone(),
                    });
                }
            }
            hash_map::Entry::Vacant(vacant) => {
                vacant.insert(InFlight {
                    generation,
                    handle: handle.clone(),
                });
            }
        }

        handle
    }
}

fn resolved<V>(entry: CacheEntry<V>) -> FetchHandle<V>
where
    V: Clone + Send + Sync + 'static,
{
    future::ready(Ok(entry)).boxed().shared()
}
