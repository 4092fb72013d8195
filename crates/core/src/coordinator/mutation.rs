use std::{future::Future, sync::Arc};

use tracing::{debug, warn};

use crate::{cache::CacheStore, error::FetchError, types::KeyFilter};

/// Runs writes and keeps the cache consistent with them.
///
/// Mutations are never deduplicated; each call runs its own request.
pub struct MutationCoordinator<V> {
    store: Arc<CacheStore<V>>,
}

impl<V> MutationCoordinator<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<CacheStore<V>>) -> Self {
        Self { store }
    }

    /// Awaits `perform`; on success invalidates every entry matched by any
    /// of `filters`. A failure leaves the cache untouched.
    pub async fn mutate<T, Fut>(&self, perform: Fut, filters: &[KeyFilter]) -> Result<T, FetchError>
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let value = perform.await.inspect_err(|error| {
            warn!(%error, "mutation failed, cache left untouched");
        })?;

        let invalidated = self
            .store
            .invalidate(|key| filters.iter().any(|filter| filter.matches(key)));
        debug!(invalidated, "mutation succeeded");

        Ok(value)
    }
}
