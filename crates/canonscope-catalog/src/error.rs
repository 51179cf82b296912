use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("page store error: {0}")]
    Store(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
