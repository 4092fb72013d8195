use std::{future::Future, sync::Arc};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    backend::Backend,
    cache::CacheStore,
    coordinator::{MutationCoordinator, RequestCoordinator},
    error::{Error, FetchError, StateError},
    monitor::{TokenBudgetMonitor, interval_ticks},
    pipeline::AnalysisPipeline,
    types::{
        CacheEntry, ClientConfig, Dataset, DatasetId, DatasetUpload, EntryStatus, KaggleDataset,
        KeyFilter, Operation, RequestKey, Resource, TokenUsageSnapshot,
    },
    validation::{clamp_search_results, validate_search_query},
};

/// One dashboard session: a cache, the coordinators in front of it, the
/// analysis pipeline and the token budget monitor.
///
/// Nothing is global; two dashboards never share entries.
pub struct Dashboard<B> {
    config: ClientConfig,
    backend: Arc<B>,
    store: Arc<CacheStore<Resource>>,
    requests: Arc<RequestCoordinator<Resource>>,
    mutations: MutationCoordinator<Resource>,
    pipeline: AnalysisPipeline<B>,
    monitor: Arc<TokenBudgetMonitor<B>>,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl<B> Dashboard<B>
where
    B: Backend + 'static,
{
    pub fn init(config: ClientConfig, backend: B) -> Self {
        let backend = Arc::new(backend);
        let store = Arc::new(CacheStore::new(config.retention));
        let requests = Arc::new(RequestCoordinator::new(
            Arc::clone(&store),
            config.staleness,
        ));

        info!(base_url = %config.base_url(), "dashboard initialised");

        Self {
            mutations: MutationCoordinator::new(Arc::clone(&store)),
            pipeline: AnalysisPipeline::new(Arc::clone(&backend), Arc::clone(&requests)),
            monitor: Arc::new(
                TokenBudgetMonitor::new(Arc::clone(&backend), Arc::clone(&requests))
                    .with_threshold(config.warning_threshold),
            ),
            monitor_task: Mutex::new(None),
            config,
            backend,
            store,
            requests,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn store(&self) -> &Arc<CacheStore<Resource>> {
        &self.store
    }

    pub fn requests(&self) -> &Arc<RequestCoordinator<Resource>> {
        &self.requests
    }

    pub fn pipeline(&self) -> &AnalysisPipeline<B> {
        &self.pipeline
    }

    pub fn monitor(&self) -> &Arc<TokenBudgetMonitor<B>> {
        &self.monitor
    }

    /// Starts polling token usage every `poll_interval`. Returns `false` if
    /// the monitor is already running.
    pub fn start_monitor(&self) -> bool {
        let mut task = self.monitor_task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let monitor = Arc::clone(&self.monitor);
        let ticks = interval_ticks(self.config.poll_interval);
        *task = Some(tokio::spawn(async move { monitor.run(ticks).await }));
        true
    }

    pub fn stop_monitor(&self) {
        if let Some(handle) = self.monitor_task.lock().take() {
            handle.abort();
            debug!("token budget monitor aborted");
        }
    }

    pub async fn datasets(&self) -> Result<Vec<Dataset>, Error> {
        let backend = Arc::clone(&self.backend);
        self.read(
            RequestKey::datasets(),
            move || {
                let backend = Arc::clone(&backend);
                async move { backend.list_datasets().await.map(Resource::Datasets) }
            },
            Resource::into_datasets,
        )
        .await
    }

    pub async fn dataset(&self, id: &DatasetId) -> Result<Dataset, Error> {
        let backend = Arc::clone(&self.backend);
        let dataset_id = id.clone();
        self.read(
            RequestKey::dataset(id),
            move || {
                let backend = Arc::clone(&backend);
                let id = dataset_id.clone();
                async move { backend.get_dataset(&id).await.map(Resource::Dataset) }
            },
            Resource::into_dataset,
        )
        .await
    }

    /// Searches Kaggle. `max_results` is clamped to the range the backend
    /// accepts.
    pub async fn search_kaggle(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<KaggleDataset>, Error> {
        let query = validate_search_query(query)?.to_string();
        let max_results = clamp_search_results(max_results);

        let backend = Arc::clone(&self.backend);
        let search = query.clone();
        self.read(
            RequestKey::kaggle_search(&query, max_results),
            move || {
                let backend = Arc::clone(&backend);
                let search = search.clone();
                async move {
                    backend
                        .search_kaggle(&search, max_results)
                        .await
                        .map(Resource::KaggleResults)
                }
            },
            Resource::into_kaggle_results,
        )
        .await
    }

    pub async fn token_usage(&self) -> Result<TokenUsageSnapshot, Error> {
        let backend = Arc::clone(&self.backend);
        self.read(
            RequestKey::token_usage(),
            move || {
                let backend = Arc::clone(&backend);
                async move { backend.token_usage().await.map(Resource::TokenUsage) }
            },
            Resource::into_token_usage,
        )
        .await
    }

    /// Uploads a file as a new dataset; the dataset list is refreshed on the
    /// next read.
    pub async fn upload_dataset(&self, upload: DatasetUpload) -> Result<Dataset, Error> {
        let file_name = upload.file_name.clone();
        let dataset = self
            .mutations
            .mutate(
                self.backend.upload_dataset(upload),
                &[KeyFilter::Exact(RequestKey::datasets())],
            )
            .await?;
        info!(%file_name, id = %dataset.id, "dataset uploaded");
        Ok(dataset)
    }

    /// Deletes a dataset and invalidates every entry that refers to it. A
    /// pipeline with this dataset selected is deselected.
    pub async fn delete_dataset(&self, id: &DatasetId) -> Result<(), Error> {
        self.mutations
            .mutate(
                self.backend.delete_dataset(id),
                &[
                    KeyFilter::Operation(Operation::Datasets),
                    KeyFilter::Dataset(id.clone()),
                ],
            )
            .await?;

        if self.pipeline.dataset().as_ref() == Some(id) {
            self.pipeline.select_dataset(None);
        }
        info!(%id, "dataset deleted");
        Ok(())
    }

    pub async fn download_kaggle_dataset(&self, dataset_ref: &str) -> Result<Dataset, Error> {
        let dataset = self
            .mutations
            .mutate(
                self.backend.download_kaggle(dataset_ref.trim()),
                &[KeyFilter::Exact(RequestKey::datasets())],
            )
            .await?;
        info!(%dataset_ref, id = %dataset.id, "kaggle dataset imported");
        Ok(dataset)
    }

    /// Evicts entries nobody observes that have outlived the retention window.
    /// Starting any fetch runs the same sweep.
    pub fn collect_garbage(&self) -> usize {
        let evicted = self.store.collect_garbage();
        if evicted > 0 {
            debug!(evicted, "cache entries collected");
        }
        evicted
    }

    /// Stops the monitor and drops every entry, listener and in-flight
    /// marker. Fetches still running can no longer commit.
    pub fn dispose(&self) {
        self.stop_monitor();
        self.requests.clear_in_flight();
        self.store.clear();
        self.pipeline.reset();
        info!("dashboard disposed");
    }

    async fn read<F, Fut, T>(
        &self,
        key: RequestKey,
        perform: F,
        extract: fn(Resource) -> Option<T>,
    ) -> Result<T, Error>
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resource, FetchError>> + Send + 'static,
    {
        let entry = self.requests.fetch_latest(key, perform).await;
        resource_from(entry, extract)
    }
}

impl<B> Drop for Dashboard<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor_task.get_mut().take() {
            handle.abort();
        }
    }
}

fn resource_from<T>(
    entry: CacheEntry<Resource>,
    extract: fn(Resource) -> Option<T>,
) -> Result<T, Error> {
    if entry.status == EntryStatus::Error {
        let error = entry
            .error
            .unwrap_or_else(|| FetchError::transient("fetch failed without an error"));
        return Err(error.into());
    }

    let key = entry.key.to_string();
    entry
        .value
        .and_then(extract)
        .ok_or_else(|| StateError::UnexpectedResource { key }.into())
}
