use thiserror::Error;

/// Failures while acquiring page content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Unreachable: {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },
}

impl FetchError {
    pub fn unreachable(url: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::Unreachable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        FetchError::Timeout { url: url.into() }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::timeout(url)
        } else {
            FetchError::unreachable(url, err)
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Malformed target list: {0}")]
    Malformed(String),

    #[error("IO failure: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
