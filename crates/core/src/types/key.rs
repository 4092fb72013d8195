use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use super::{analysis::AnalysisRequest, dataset::DatasetId};

/// Parameter name under which keys record the dataset they were built against.
pub const DATASET_PARAM: &str = "dataset";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Datasets,
    Dataset,
    KaggleSearch,
    Analyze,
    TokenUsage,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Datasets => "datasets",
            Self::Dataset => "dataset",
            Self::KaggleSearch => "kaggle-search",
            Self::Analyze => "analyze",
            Self::TokenUsage => "token-usage",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural identity of a cacheable request.
///
/// Parameters are kept sorted by name and values are trimmed, so two
/// logically identical requests always compare (and hash) equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    operation: Operation,
    params: BTreeMap<String, String>,
}

impl RequestKey {
    pub fn new<I, K, V>(operation: Operation, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params = params
            .into_iter()
            .map(|(name, value)| {
                (
                    name.as_ref().trim().to_string(),
                    value.as_ref().trim().to_string(),
                )
            })
            .collect();
        Self { operation, params }
    }

    pub fn datasets() -> Self {
        Self::new(Operation::Datasets, None::<(&str, &str)>)
    }

    pub fn dataset(id: &DatasetId) -> Self {
        Self::new(Operation::Dataset, [(DATASET_PARAM, id.as_str())])
    }

    pub fn kaggle_search(query: &str, max_results: u32) -> Self {
        Self::new(
            Operation::KaggleSearch,
            [
                ("query", query.to_string()),
                ("max_results", max_results.to_string()),
            ],
        )
    }

    pub fn analyze(request: &AnalysisRequest) -> Self {
        Self::new(
            Operation::Analyze,
            [
                ("query", request.query()),
                (DATASET_PARAM, request.dataset_id().as_str()),
            ],
        )
    }

    pub fn token_usage() -> Self {
        Self::new(Operation::TokenUsage, None::<(&str, &str)>)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn references_dataset(&self, id: &DatasetId) -> bool {
        self.param(DATASET_PARAM) == Some(id.as_str())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation.as_str())?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value:?}")?;
        }
        Ok(())
    }
}

/// Selects cache entries for invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    Operation(Operation),
    Dataset(DatasetId),
    Exact(RequestKey),
}

impl KeyFilter {
    pub fn matches(&self, key: &RequestKey) -> bool {
        match self {
            Self::Operation(operation) => key.operation() == *operation,
            Self::Dataset(id) => key.references_dataset(id),
            Self::Exact(exact) => key == exact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identical_requests_normalize_to_equal_keys() {
        let a = RequestKey::analyze(&AnalysisRequest::new(
            "trend analysis ",
            DatasetId::new("ds1"),
        ));
        let b = RequestKey::new(
            Operation::Analyze,
            [("dataset", " ds1"), ("query", "trend analysis")],
        );
        assert_eq!(a, b);

        let keys: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn different_parameters_differ() {
        let ds1 = DatasetId::new("ds1");
        let ds2 = DatasetId::new("ds2");
        assert_ne!(
            RequestKey::analyze(&AnalysisRequest::new("q", ds1.clone())),
            RequestKey::analyze(&AnalysisRequest::new("q", ds2))
        );
        assert_ne!(RequestKey::dataset(&ds1), RequestKey::datasets());
        assert_ne!(
            RequestKey::kaggle_search("covid", 10),
            RequestKey::kaggle_search("covid", 20)
        );
    }

    #[test]
    fn filters_select_by_dataset_reference() {
        let ds1 = DatasetId::new("ds1");
        let analysis = RequestKey::analyze(&AnalysisRequest::new("q", ds1.clone()));
        let detail = RequestKey::dataset(&ds1);
        let other = RequestKey::dataset(&DatasetId::new("ds10"));

        let filter = KeyFilter::Dataset(ds1);
        assert!(filter.matches(&analysis));
        assert!(filter.matches(&detail));
        assert!(!filter.matches(&other));
        assert!(!filter.matches(&RequestKey::datasets()));
        assert!(KeyFilter::Operation(Operation::Datasets).matches(&RequestKey::datasets()));
    }

    #[test]
    fn exact_filter_ignores_siblings() {
        let search = RequestKey::kaggle_search("covid", 10);
        let filter = KeyFilter::Exact(RequestKey::kaggle_search(" covid", 10));
        assert!(filter.matches(&search));
        assert!(!filter.matches(&RequestKey::kaggle_search("covid", 20)));
        assert!(!filter.matches(&RequestKey::datasets()));
    }

    #[test]
    fn display_lists_sorted_params() {
        let key = RequestKey::analyze(&AnalysisRequest::new("sales", DatasetId::new("ds1")));
        assert_eq!(key.to_string(), r#"analyze?dataset="ds1"&query="sales""#);
        assert_eq!(RequestKey::token_usage().to_string(), "token-usage");
    }
}
