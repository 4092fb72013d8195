use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use sift_core::{
    AnalysisBackend, AnalysisRequest, AnalysisResult, ClientConfig, Dataset, DatasetBackend,
    DatasetId, DatasetUpload, FetchError, KaggleDataset, TokenUsageSnapshot,
};
use tracing::debug;

use crate::wire::{
    AnalysisResponse, AnalyzeBody, DatasetWire, ErrorBody, KaggleDatasetWire, TokenUsageWire,
    UploadResponse,
};

/// Analyses run several agents back to back and routinely take tens of
/// seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const KAGGLE_FILE_TYPE: &str = "csv";

/// [`AnalysisBackend`] and [`DatasetBackend`] over the backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> reqwest::Result<Self> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(config: ClientConfig, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: ClientConfig, client: Client) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let body = self.send_raw(request).await?;
        decode(&body)
    }

    async fn send_raw(&self, request: RequestBuilder) -> Result<String, FetchError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let url = response.url().path().to_string();
        let body = response.text().await.map_err(transport_error)?;
        debug!(%url, status, bytes = body.len(), "backend responded");

        if !(200..300).contains(&status) {
            return Err(status_error(status, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, FetchError> {
        let response: AnalysisResponse = self
            .send(
                self.client
                    .post(self.url("/api/analysis/analyze"))
                    .json(&AnalyzeBody::from(request)),
            )
            .await?;
        Ok(response.into_result())
    }

    async fn token_usage(&self) -> Result<TokenUsageSnapshot, FetchError> {
        let usage: TokenUsageWire = self
            .send(self.client.get(self.url("/api/analysis/token-usage")))
            .await?;
        usage.into_snapshot()
    }
}

#[async_trait]
impl DatasetBackend for HttpBackend {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, FetchError> {
        let datasets: Vec<DatasetWire> =
            self.send(self.client.get(self.url("/api/datasets"))).await?;
        Ok(datasets.into_iter().map(Dataset::from).collect())
    }

    async fn get_dataset(&self, id: &DatasetId) -> Result<Dataset, FetchError> {
        let dataset: DatasetWire = self
            .send(self.client.get(self.url(&format!("/api/datasets/{id}"))))
            .await?;
        Ok(dataset.into())
    }

    async fn upload_dataset(&self, upload: DatasetUpload) -> Result<Dataset, FetchError> {
        let part = Part::bytes(upload.bytes).file_name(upload.file_name);
        let form = Form::new().part("file", part);
        let response: UploadResponse = self
            .send(
                self.client
                    .post(self.url("/api/datasets/upload"))
                    .multipart(form),
            )
            .await?;
        Ok(response.into())
    }

    async fn delete_dataset(&self, id: &DatasetId) -> Result<(), FetchError> {
        self.send_raw(self.client.delete(self.url(&format!("/api/datasets/{id}"))))
            .await?;
        Ok(())
    }

    async fn search_kaggle(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<KaggleDataset>, FetchError> {
        let results: Vec<KaggleDatasetWire> = self
            .send(
                self.client
                    .get(self.url("/api/datasets/kaggle/search"))
                    .query(&[
                        ("query", query.to_string()),
                        ("max_results", max_results.to_string()),
                        ("file_type", KAGGLE_FILE_TYPE.to_string()),
                    ]),
            )
            .await?;
        Ok(results.into_iter().map(KaggleDataset::from).collect())
    }

    async fn download_kaggle(&self, dataset_ref: &str) -> Result<Dataset, FetchError> {
        let dataset: DatasetWire = self
            .send(self.client.post(self.url(&format!(
                "/api/datasets/kaggle/download/{}",
                dataset_ref.trim_matches('/')
            ))))
            .await?;
        Ok(dataset.into())
    }
}

/// Requests that never left the client (a malformed URL, say) will fail the
/// same way again; everything else on the wire is worth one retry.
fn transport_error(error: reqwest::Error) -> FetchError {
    if error.is_builder() {
        FetchError::request(None, error.to_string())
    } else {
        FetchError::transient(error.to_string())
    }
}

fn status_error(status: u16, body: &str) -> FetchError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|body| body.message())
        .ok()
        .filter(|message| !message.trim().is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|body| !body.is_empty()))
        .unwrap_or_else(|| format!("HTTP {status}"));
    FetchError::from_status(status, message)
}

fn decode<T>(body: &str) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    serde_json::from_str(body)
        .map_err(|error| FetchError::request(None, format!("unexpected response body: {error}")))
}
