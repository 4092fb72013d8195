use std::{fs, path::Path};

use eyre::{Result, WrapErr, eyre};
use sift_core::{Backend, Dashboard, Dataset, DatasetId, DatasetUpload};

pub async fn list<B>(dashboard: &Dashboard<B>) -> Result<Vec<Dataset>>
where
    B: Backend + 'static,
{
    Ok(dashboard.datasets().await?)
}

pub async fn show<B>(dashboard: &Dashboard<B>, id: &str) -> Result<Dataset>
where
    B: Backend + 'static,
{
    Ok(dashboard.dataset(&DatasetId::new(id)).await?)
}

pub async fn upload<B>(dashboard: &Dashboard<B>, path: &Path) -> Result<Dataset>
where
    B: Backend + 'static,
{
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| eyre!("{} is not a file", path.display()))?;
    let bytes = fs::read(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;

    let upload = DatasetUpload::new(file_name, bytes);
    if upload.format().is_none() {
        return Err(eyre!(
            "unsupported file type {file_name:?}: upload a .csv, .json, .xlsx or .xls file"
        ));
    }

    Ok(dashboard.upload_dataset(upload).await?)
}

pub async fn delete<B>(dashboard: &Dashboard<B>, id: &str) -> Result<()>
where
    B: Backend + 'static,
{
    dashboard.delete_dataset(&DatasetId::new(id)).await?;
    Ok(())
}
