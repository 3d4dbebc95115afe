use crate::shared::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentApiError {
    #[error("Content API rejected credentials (status {0})")]
    Unauthorized(u16),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Content API rate limit exceeded")]
    RateLimited,

    #[error("Content API returned status {0}")]
    Status(u16),

    #[error("Content API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Malformed content API response: {0}")]
    Decode(String),
}

impl From<ContentApiError> for AppError {
    fn from(err: ContentApiError) -> Self {
        match err {
            ContentApiError::NotFound(_) => AppError::NotFound(err.to_string()),
            ContentApiError::Unauthorized(_) => AppError::ConfigurationError(err.to_string()),
            ContentApiError::Decode(_) => AppError::DeserializationError(err.to_string()),
            ContentApiError::RateLimited
            | ContentApiError::Status(_)
            | ContentApiError::Request(_) => AppError::Network(err.to_string()),
        }
    }
}
