use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid date specification: {0}")]
    InvalidDateSpec(String),

    #[error("Network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Inventory entry has no file name: {url}")]
    InvalidEntry { url: String },

    #[error("Failed to parse inventory: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SyncError {
    /// Wraps a reqwest failure, separating timeouts from other transport errors.
    pub(crate) fn from_request(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            SyncError::Timeout {
                url: url.to_string(),
            }
        } else {
            SyncError::Network {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Whether a later invocation has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Timeout { .. } | SyncError::Network { .. } => true,
            SyncError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
