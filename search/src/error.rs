use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("search failed: {0}")]
    SearchFailed(String),

    #[error("query too short: {0:?}")]
    InvalidQuery(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
