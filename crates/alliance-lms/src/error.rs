//! Error types for the LMS client.

use thiserror::Error;

/// Result type alias using `LmsError`.
pub type LmsResult<T> = Result<T, LmsError>;

/// Errors that can occur when talking to the LMS.
#[derive(Debug, Error)]
pub enum LmsError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure (timeout, connection refused). Retryable.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the LMS API.
    #[error("LMS API error ({status}) on {endpoint}: {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// Response body was not the expected JSON shape.
    #[error("Unparseable LMS response from {endpoint}: {snippet}")]
    Parse { endpoint: String, snippet: String },

    /// A fetched record could not be mapped.
    #[error("Record mapping error: {0}")]
    Record(String),

    /// The client's health monitor tripped; large operations refuse to run.
    #[error("LMS client unhealthy after {consecutive_failures} consecutive failures")]
    Unhealthy { consecutive_failures: u32 },
}

impl LmsError {
    /// Builds an API error with the status-specific message text.
    #[must_use]
    pub fn api(status: u16, endpoint: &str) -> Self {
        Self::Api {
            status,
            endpoint: endpoint.to_string(),
            message: status_message(status).to_string(),
        }
    }

    /// Whether this is a 404 — a business outcome in several flows
    /// (expected learner churn, already-deleted groups), not a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Whether this is the transport class of failure (retryable).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// Maps a status code to operator-facing message text.
pub(crate) fn status_message(status: u16) -> &'static str {
    match status {
        401 => "authentication failed, check the API token",
        403 => "permission denied for this resource",
        404 => "resource not found",
        429 => "rate limited by the LMS",
        500..=599 => "LMS is unavailable upstream",
        _ => "unexpected response",
    }
}

/// Truncates a raw body for inclusion in a parse error.
pub(crate) fn body_snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(LmsError::api(404, "/users/9").is_not_found());
        assert!(!LmsError::api(500, "/users/9").is_not_found());
        assert!(!LmsError::Config("x".into()).is_not_found());
    }
}
