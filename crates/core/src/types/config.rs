use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

use super::{key::Operation, usage::WARNING_THRESHOLD_PERCENT};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const BASE_URL_ENV: &str = "SIFT_API_URL";

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// How long a successful result of each operation is served without refetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub datasets: Duration,
    pub dataset: Duration,
    pub kaggle_search: Duration,
    pub analysis: Duration,
    pub token_usage: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            datasets: Duration::from_secs(5 * 60),
            dataset: Duration::from_secs(5 * 60),
            kaggle_search: Duration::from_secs(5 * 60),
            analysis: Duration::from_secs(5 * 60),
            token_usage: Duration::from_secs(60),
        }
    }
}

impl StalenessPolicy {
    pub fn for_operation(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Datasets => self.datasets,
            Operation::Dataset => self.dataset,
            Operation::KaggleSearch => self.kaggle_search,
            Operation::Analyze => self.analysis,
            Operation::TokenUsage => self.token_usage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    pub staleness: StalenessPolicy,
    /// How long an unobserved entry is kept before garbage collection.
    pub retention: Duration,
    pub poll_interval: Duration,
    /// Usage percentage above which the token monitor warns.
    pub warning_threshold: f64,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(base_url.to_string()));
        }

        Ok(Self {
            base_url: parsed,
            staleness: StalenessPolicy::default(),
            retention: DEFAULT_RETENTION,
            poll_interval: DEFAULT_POLL_INTERVAL,
            warning_threshold: WARNING_THRESHOLD_PERCENT,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins an absolute API path onto the base URL, keeping any path prefix
    /// the base carries.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_staleness_windows() {
        let policy = StalenessPolicy::default();
        assert_eq!(
            policy.for_operation(Operation::Analyze),
            Duration::from_secs(300)
        );
        assert_eq!(
            policy.for_operation(Operation::TokenUsage),
            Duration::from_secs(60)
        );
        assert_eq!(
            policy.for_operation(Operation::Datasets),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn endpoints_keep_base_prefix() {
        let config = ClientConfig::new("https://example.com/dashboard/").expect("valid url");
        assert_eq!(
            config.endpoint("/api/datasets"),
            "https://example.com/dashboard/api/datasets"
        );

        let config = ClientConfig::new("http://localhost:8000").expect("valid url");
        assert_eq!(
            config.endpoint("api/analysis/analyze"),
            "http://localhost:8000/api/analysis/analyze"
        );
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(matches!(
            ClientConfig::new("not a url"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ClientConfig::new("ftp://example.com"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
    }
}
