use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
    backend::{AnalysisBackend, DatasetBackend},
    error::FetchError,
    types::{
        AnalysisReport, AnalysisRequest, AnalysisResult, Dataset, DatasetFormat, DatasetId,
        DatasetUpload, KaggleDataset, Narrative, QaReview, TokenUsageSnapshot, Visualizations,
    },
};

type Reply<T> = Result<T, FetchError>;

enum Scripted<T> {
    Ready(Reply<T>),
    Gated(oneshot::Receiver<Reply<T>>),
}

impl<T> Scripted<T> {
    async fn resolve(self) -> Reply<T> {
        match self {
            Self::Ready(reply) => reply,
            Self::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::transient("gate dropped"))),
        }
    }
}

/// Scriptable in-memory backend. Analysis replies are queued per query so
/// tests do not depend on the order futures are first polled in.
#[derive(Default)]
pub(crate) struct MockBackend {
    datasets: Mutex<Vec<Dataset>>,
    analyses: Mutex<HashMap<String, VecDeque<Scripted<AnalysisResult>>>>,
    usage: Mutex<VecDeque<Scripted<TokenUsageSnapshot>>>,
    delete_errors: Mutex<VecDeque<FetchError>>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn with_datasets(ids: &[&str]) -> Self {
        let backend = Self::default();
        backend
            .datasets
            .lock()
            .extend(ids.iter().map(|id| dataset(id)));
        backend
    }

    pub fn push_analysis(&self, query: &str, reply: Reply<AnalysisResult>) {
        self.analyses
            .lock()
            .entry(query.to_string())
            .or_default()
            .push_back(Scripted::Ready(reply));
    }

    pub fn gate_analysis(&self, query: &str) -> oneshot::Sender<Reply<AnalysisResult>> {
        let (tx, rx) = oneshot::channel();
        self.analyses
            .lock()
            .entry(query.to_string())
            .or_default()
            .push_back(Scripted::Gated(rx));
        tx
    }

    pub fn push_usage(&self, reply: Reply<TokenUsageSnapshot>) {
        self.usage.lock().push_back(Scripted::Ready(reply));
    }

    pub fn fail_next_delete(&self, error: FetchError) {
        self.delete_errors.lock().push_back(error);
    }

    /// Number of calls whose label starts with `prefix`.
    pub fn calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AnalysisBackend for MockBackend {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, FetchError> {
        self.record(format!("analyze:{}@{}", request.query(), request.dataset_id()));
        let scripted = self
            .analyses
            .lock()
            .get_mut(request.query())
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Err(FetchError::request(Some(400), "unscripted analysis")),
        }
    }

    async fn token_usage(&self) -> Result<TokenUsageSnapshot, FetchError> {
        self.record("token_usage".to_string());
        let scripted = self.usage.lock().pop_front();
        match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Err(FetchError::transient("usage endpoint unavailable")),
        }
    }
}

#[async_trait]
impl DatasetBackend for MockBackend {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, FetchError> {
        self.record("list".to_string());
        Ok(self.datasets.lock().clone())
    }

    async fn get_dataset(&self, id: &DatasetId) -> Result<Dataset, FetchError> {
        self.record(format!("get:{id}"));
        self.datasets
            .lock()
            .iter()
            .find(|dataset| &dataset.id == id)
            .cloned()
            .ok_or_else(|| FetchError::request(Some(404), "Dataset not found"))
    }

    async fn upload_dataset(&self, upload: DatasetUpload) -> Result<Dataset, FetchError> {
        self.record(format!("upload:{}", upload.file_name));
        let name = upload
            .file_name
            .rsplit_once('.')
            .map_or(upload.file_name.as_str(), |(stem, _)| stem);
        let mut created = dataset(name);
        created.size = upload.bytes.len() as u64;
        self.datasets.lock().push(created.clone());
        Ok(created)
    }

    async fn delete_dataset(&self, id: &DatasetId) -> Result<(), FetchError> {
        self.record(format!("delete:{id}"));
        if let Some(error) = self.delete_errors.lock().pop_front() {
            return Err(error);
        }
        self.datasets.lock().retain(|dataset| &dataset.id != id);
        Ok(())
    }

    async fn search_kaggle(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<KaggleDataset>, FetchError> {
        self.record(format!("kaggle_search:{query}"));
        Ok((0..max_results.min(3))
            .map(|i| KaggleDataset {
                id: format!("owner/{query}-{i}"),
                title: format!("{query} {i}"),
                description: String::new(),
                size: 1024,
                last_updated: "2024-05-01T00:00:00".to_string(),
                download_count: 10,
                file_count: 1,
            })
            .collect())
    }

    async fn download_kaggle(&self, dataset_ref: &str) -> Result<Dataset, FetchError> {
        self.record(format!("kaggle_download:{dataset_ref}"));
        let created = dataset(&format!("kaggle_{}", dataset_ref.replace('/', "_")));
        self.datasets.lock().push(created.clone());
        Ok(created)
    }
}

pub(crate) fn dataset(id: &str) -> Dataset {
    Dataset {
        id: DatasetId::new(id),
        name: id.to_string(),
        description: format!("Uploaded {id}"),
        format: DatasetFormat::Json,
        size: 128,
        columns: vec!["region".to_string(), "revenue".to_string()],
        last_updated: "2024-05-01T00:00:00".to_string(),
    }
}

pub(crate) fn report(summary: &str) -> AnalysisReport {
    AnalysisReport {
        narrative: Narrative {
            executive_summary: summary.to_string(),
            ..Narrative::default()
        },
        visualizations: Visualizations::default(),
        qa_review: QaReview::default(),
        warnings: Vec::new(),
        token_usage: None,
    }
}

pub(crate) fn usage(current: u64, limit: u64) -> TokenUsageSnapshot {
    let last_reset = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .expect("valid timestamp");
    TokenUsageSnapshot::new(
        current,
        limit,
        BTreeMap::from([("data_analyst".to_string(), current)]),
        last_reset,
    )
}
