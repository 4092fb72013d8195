use async_trait::async_trait;

use crate::{
    error::FetchError,
    types::{
        AnalysisRequest, AnalysisResult, Dataset, DatasetId, DatasetUpload, KaggleDataset,
        TokenUsageSnapshot,
    },
};

/// Analysis and token accounting endpoints.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, FetchError>;

    async fn token_usage(&self) -> Result<TokenUsageSnapshot, FetchError>;
}

/// Dataset catalogue endpoints, including the Kaggle bridge.
#[async_trait]
pub trait DatasetBackend: Send + Sync {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, FetchError>;

    async fn get_dataset(&self, id: &DatasetId) -> Result<Dataset, FetchError>;

    async fn upload_dataset(&self, upload: DatasetUpload) -> Result<Dataset, FetchError>;

    async fn delete_dataset(&self, id: &DatasetId) -> Result<(), FetchError>;

    async fn search_kaggle(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<KaggleDataset>, FetchError>;

    async fn download_kaggle(&self, dataset_ref: &str) -> Result<Dataset, FetchError>;
}

pub trait Backend: AnalysisBackend + DatasetBackend {}

impl<T> Backend for T where T: AnalysisBackend + DatasetBackend {}
