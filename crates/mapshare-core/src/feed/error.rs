use thiserror::Error;

use crate::kml::KmlError;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Unauthorized - MapShare password missing or wrong")]
    Unauthorized,

    #[error("MapShare not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Malformed feed: {0}")]
    MalformedFeed(#[from] KmlError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FeedError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => FeedError::Unauthorized,
            404 => FeedError::NotFound(truncated),
            429 => FeedError::RateLimited,
            500..=599 => FeedError::ServerError(truncated),
            _ => FeedError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
