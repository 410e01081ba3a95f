use thiserror::Error;

/// Error taxonomy for the search backend. Kinds map one-to-one onto HTTP
/// status codes at the API boundary; `Degraded` never crosses that boundary
/// as an error (the orchestrator folds it into response metadata instead).
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("deadline exceeded after {0} ms")]
    Timeout(u64),

    /// A non-essential external service failed; the pipeline proceeded
    /// without it. Converted to metadata, not an HTTP error.
    #[error("dependency degraded: {0}")]
    Degraded(String),

    /// An essential dependency failed and the operation cannot proceed.
    #[error("dependency failure: {0}")]
    DependencyFatal(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::Validation(_) => "validation_error",
            SearchError::Timeout(_) => "timeout",
            SearchError::Degraded(_) => "dependency_degraded",
            SearchError::DependencyFatal(_) => "dependency_unavailable",
            SearchError::NotFound(_) => "not_found",
            SearchError::RateLimited { .. } => "rate_limited",
            SearchError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            SearchError::Validation(_) => 400,
            SearchError::Timeout(_) => 504,
            // Degraded is not an HTTP failure; if one ever escapes it is a bug,
            // surface it as a server error rather than lying with a 200.
            SearchError::Degraded(_) => 500,
            SearchError::DependencyFatal(_) => 503,
            SearchError::NotFound(_) => 404,
            SearchError::RateLimited { .. } => 429,
            SearchError::Internal(_) => 500,
        }
    }
}

impl From<anyhow::Error> for SearchError {
    fn from(err: anyhow::Error) -> Self {
        SearchError::Internal(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
