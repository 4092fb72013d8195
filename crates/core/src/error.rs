use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Superseded(#[from] Superseded),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("base url {0:?} must use http or https")]
    UnsupportedScheme(String),
}

/// Rejections raised before anything is sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please enter an analysis query")]
    EmptyQuery,

    #[error("please select a dataset first")]
    NoDatasetSelected,

    #[error("search query must not be empty")]
    EmptySearchQuery,
}

/// Failure of a backend call, classified by whether a retry can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network failure or a 5xx response.
    #[error("backend unavailable: {0}")]
    Transient(String),

    /// 4xx response or a body that could not be decoded. Never retried.
    #[error("{message}")]
    Request {
        status: Option<u16>,
        message: String,
    },
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn request(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status >= 500 {
            Self::transient(message)
        } else {
            Self::request(Some(status), message)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient(_) => None,
            Self::Request { status, .. } => *status,
        }
    }
}

/// A completed fetch whose generation is no longer current for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("result superseded by a newer request for the same key")]
pub struct Superseded;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("an analysis request is already in flight")]
    AlreadyRequesting,

    #[error("analysis already settled; edit the query or dataset, or reset")]
    SessionSettled,

    #[error("cached value for {key} has an unexpected shape")]
    UnexpectedResource { key: String },
}
