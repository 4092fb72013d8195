use std::sync::Arc;

use eyre::{Result, eyre};
use sift_core::{AnalysisReport, Backend, Dashboard, DatasetId, PipelineState};

pub async fn analyze<B>(
    dashboard: &Dashboard<B>,
    dataset: &str,
    query: &str,
) -> Result<Arc<AnalysisReport>>
where
    B: Backend + 'static,
{
    let pipeline = dashboard.pipeline();
    pipeline.select_dataset(Some(DatasetId::new(dataset)));
    pipeline.set_query(query);

    match pipeline.submit()?.settle().await {
        PipelineState::Succeeded(report) => Ok(report),
        PipelineState::Failed(message) => Err(eyre!(message)),
        other => Err(eyre!("analysis ended while {}", other.name())),
    }
}
