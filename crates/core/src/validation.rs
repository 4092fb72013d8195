use crate::{
    error::ValidationError,
    types::{AnalysisRequest, DatasetId},
};

pub const MIN_SEARCH_RESULTS: u32 = 1;
pub const MAX_SEARCH_RESULTS: u32 = 50;

pub fn validate_submission(
    query: &str,
    dataset: Option<&DatasetId>,
) -> Result<AnalysisRequest, ValidationError> {
    let dataset = dataset
        .filter(|id| !id.is_blank())
        .ok_or(ValidationError::NoDatasetSelected)?;

    if query.trim().is_empty() {
        return Err(ValidationError::EmptyQuery);
    }

    Ok(AnalysisRequest::new(query, dataset.clone()))
}

pub fn validate_search_query(query: &str) -> Result<&str, ValidationError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ValidationError::EmptySearchQuery);
    }
    Ok(query)
}

pub fn clamp_search_results(max_results: u32) -> u32 {
    max_results.clamp(MIN_SEARCH_RESULTS, MAX_SEARCH_RESULTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_dataset_and_query() {
        let ds1 = DatasetId::new("ds1");
        assert_eq!(
            validate_submission("trend analysis", None),
            Err(ValidationError::NoDatasetSelected)
        );
        assert_eq!(
            validate_submission("trend analysis", Some(&DatasetId::new(" "))),
            Err(ValidationError::NoDatasetSelected)
        );
        assert_eq!(
            validate_submission("   ", Some(&ds1)),
            Err(ValidationError::EmptyQuery)
        );

        let request = validate_submission(" trend analysis\n", Some(&ds1)).expect("valid");
        assert_eq!(request.query(), "trend analysis");
        assert_eq!(request.dataset_id(), &ds1);
    }

    #[test]
    fn search_queries_are_trimmed_and_bounded() {
        assert_eq!(validate_search_query("  covid "), Ok("covid"));
        assert_eq!(
            validate_search_query(""),
            Err(ValidationError::EmptySearchQuery)
        );
        assert_eq!(clamp_search_results(0), 1);
        assert_eq!(clamp_search_results(10), 10);
        assert_eq!(clamp_search_results(500), 50);
    }
}
