use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Malformed content from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Local file error: {0}")]
    Io(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
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

    pub fn from_status(status: u16, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            // GitHub answers an exhausted quota with 403, other hosts with 429
            403 | 429 => FetchError::RateLimited,
            404 => FetchError::NotFound(truncated),
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::BadStatus {
                status,
                body: truncated,
            },
        }
    }

    pub fn malformed(url: &str, reason: impl ToString) -> Self {
        FetchError::Malformed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether another attempt against the same URL can change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Network(_)
                | FetchError::RateLimited
                | FetchError::ServerError(_)
                | FetchError::BadStatus { .. }
        )
    }
}
