use super::{
    analysis::AnalysisResult,
    dataset::{Dataset, KaggleDataset},
    usage::TokenUsageSnapshot,
};

/// Everything the dashboard caches, one variant per operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Datasets(Vec<Dataset>),
    Dataset(Dataset),
    KaggleResults(Vec<KaggleDataset>),
    Analysis(AnalysisResult),
    TokenUsage(TokenUsageSnapshot),
}

impl Resource {
    pub fn into_datasets(self) -> Option<Vec<Dataset>> {
        match self {
            Self::Datasets(datasets) => Some(datasets),
            _ => None,
        }
    }

    pub fn into_dataset(self) -> Option<Dataset> {
        match self {
            Self::Dataset(dataset) => Some(dataset),
            _ => None,
        }
    }

    pub fn into_kaggle_results(self) -> Option<Vec<KaggleDataset>> {
        match self {
            Self::KaggleResults(results) => Some(results),
            _ => None,
        }
    }

    pub fn into_analysis(self) -> Option<AnalysisResult> {
        match self {
            Self::Analysis(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_token_usage(self) -> Option<TokenUsageSnapshot> {
        match self {
            Self::TokenUsage(usage) => Some(usage),
            _ => None,
        }
    }
}
