use eyre::Result;
use sift_core::{Backend, Dashboard, Dataset, KaggleDataset};

pub const DEFAULT_MAX_RESULTS: u32 = 10;

pub async fn search<B>(
    dashboard: &Dashboard<B>,
    query: &str,
    max_results: u32,
) -> Result<Vec<KaggleDataset>>
where
    B: Backend + 'static,
{
    Ok(dashboard.search_kaggle(query, max_results).await?)
}

pub async fn download<B>(dashboard: &Dashboard<B>, dataset_ref: &str) -> Result<Dataset>
where
    B: Backend + 'static,
{
    Ok(dashboard.download_kaggle_dataset(dataset_ref).await?)
}
