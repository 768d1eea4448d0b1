/// Failure of a single HTTP fetch. Never fatal for the run: the caller drops
/// the affected company (or strategy path) and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Only timeouts are worth another attempt; a 4xx or a refused
    /// connection will not change on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Http(status.as_u16())
        } else if e.is_builder() {
            FetchError::InvalidUrl(e.to_string())
        } else {
            FetchError::Connection(e.to_string())
        }
    }
}

/// Errors raised inside an extraction strategy. The strategy boundary turns
/// these into an empty result.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Why a company contributed nothing to the run. Logged and counted, never
/// propagated past the worker.
#[derive(Debug, thiserror::Error)]
pub enum CompanyError {
    #[error("career page fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("{0} boards need script execution and are not scraped")]
    Unsupported(crate::models::detection::AtsBackend),

    #[error("no career page URL")]
    MissingUrl,
}

/// Fatal errors, raised only outside the per-company scrape loop.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Bad input: {0}")]
    BadInput(String),
}

impl AppError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        AppError::Json {
            path: path.display().to_string(),
            source,
        }
    }
}
