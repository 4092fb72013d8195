use serde::Deserialize;
use sift_core::{ClientConfig, DEFAULT_BASE_URL, StalenessPolicy};
use sift_http::DEFAULT_TIMEOUT;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "sift.toml";
const CONFIG_DIR_NAME: &str = "sift";

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SiftConfig {
    pub backend: BackendSection,
    pub cache: CacheSection,
    pub monitor: MonitorSection,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Freshness windows in seconds, per kind of request.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    pub datasets_secs: Option<u64>,
    pub dataset_secs: Option<u64>,
    pub kaggle_search_secs: Option<u64>,
    pub analysis_secs: Option<u64>,
    pub token_usage_secs: Option<u64>,
    pub retention_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSection {
    pub interval_secs: Option<u64>,
    pub warning_threshold: Option<f64>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Overrides {
    pub base_url: Option<String>,
}

/// Everything the binary needs to build a dashboard.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse toml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Client(#[from] sift_core::ConfigError),
}

pub fn load_config(path: impl AsRef<Path>) -> Result<SiftConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: SiftConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(config)
}

/// An explicit path must exist. Otherwise `./sift.toml`, then the user's
/// config directory, are tried; with neither present the defaults apply.
pub fn load_or_default(explicit: Option<&Path>) -> Result<SiftConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    match default_locations().into_iter().find(|path| path.is_file()) {
        Some(path) => load_config(path),
        None => Ok(SiftConfig::default()),
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(DEFAULT_CONFIG_PATH)];
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join(CONFIG_DIR_NAME).join(DEFAULT_CONFIG_PATH));
    }
    locations
}

/// Command line (or `SIFT_API_URL`) beats the file, which beats the
/// built-in defaults.
pub fn resolve(config: &SiftConfig, overrides: Overrides) -> Result<Settings, ConfigError> {
    let base_url = overrides
        .base_url
        .or_else(|| config.backend.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let mut client = ClientConfig::new(&base_url)?;
    client.staleness = staleness(&config.cache);
    if let Some(secs) = config.cache.retention_secs {
        client.retention = Duration::from_secs(secs);
    }
    if let Some(secs) = config.monitor.interval_secs {
        client.poll_interval = Duration::from_secs(secs);
    }
    if let Some(threshold) = config.monitor.warning_threshold {
        client.warning_threshold = threshold;
    }

    Ok(Settings {
        client,
        timeout: config
            .backend
            .timeout_secs
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
    })
}

fn staleness(cache: &CacheSection) -> StalenessPolicy {
    let defaults = StalenessPolicy::default();
    let window = |secs: Option<u64>, default: Duration| secs.map_or(default, Duration::from_secs);
    StalenessPolicy {
        datasets: window(cache.datasets_secs, defaults.datasets),
        dataset: window(cache.dataset_secs, defaults.dataset),
        kaggle_search: window(cache.kaggle_search_secs, defaults.kaggle_search),
        analysis: window(cache.analysis_secs, defaults.analysis),
        token_usage: window(cache.token_usage_secs, defaults.token_usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::DEFAULT_WARNING_THRESHOLD;
    use std::path::Path;

    #[test]
    fn parses_example_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("sift.example.toml");
        let config = load_config(path).expect("should parse example config");

        assert_eq!(
            config.backend.base_url.as_deref(),
            Some("http://localhost:8000")
        );
        assert_eq!(config.cache.token_usage_secs, Some(60));
        assert_eq!(config.monitor.interval_secs, Some(60));
        assert_eq!(config.monitor.warning_threshold, Some(90.0));
    }

    #[test]
    fn override_beats_file_beats_default() {
        let config: SiftConfig = toml::from_str(
            r#"
            [backend]
            base_url = "https://analytics.internal"

            [cache]
            analysis_secs = 30
            "#,
        )
        .expect("valid toml");

        let settings = resolve(&config, Overrides::default()).expect("resolves");
        assert_eq!(
            settings.client.base_url().as_str(),
            "https://analytics.internal/"
        );
        assert_eq!(settings.client.staleness.analysis, Duration::from_secs(30));
        assert_eq!(
            settings.client.staleness.token_usage,
            Duration::from_secs(60)
        );
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);

        let settings = resolve(
            &config,
            Overrides {
                base_url: Some("http://127.0.0.1:9000".into()),
            },
        )
        .expect("resolves");
        assert_eq!(settings.client.base_url().as_str(), "http://127.0.0.1:9000/");

        let settings = resolve(&SiftConfig::default(), Overrides::default()).expect("resolves");
        assert_eq!(settings.client.base_url().as_str(), "http://localhost:8000/");
        assert_eq!(settings.client.warning_threshold, DEFAULT_WARNING_THRESHOLD);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            load_config(Path::new(env!("CARGO_MANIFEST_DIR")).join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));

        assert!(toml::from_str::<SiftConfig>("[backend]\nurl = \"x\"").is_err());

        let config: SiftConfig =
            toml::from_str("[backend]\nbase_url = \"ftp://files\"").expect("valid toml");
        assert!(matches!(
            resolve(&config, Overrides::default()),
            Err(ConfigError::Client(_))
        ));
    }
}
