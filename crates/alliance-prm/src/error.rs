//! Error types for the PRM client.

use thiserror::Error;

/// Result type alias using `PrmError`.
pub type PrmResult<T> = Result<T, PrmError>;

/// Errors that can occur when talking to the PRM.
#[derive(Debug, Error)]
pub enum PrmError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure (timeout, connection refused). Retryable.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the PRM API.
    #[error("PRM API error ({status}) on {endpoint}: {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// Response body was not the expected JSON shape.
    #[error("Unparseable PRM response from {endpoint}: {snippet}")]
    Parse { endpoint: String, snippet: String },

    /// A fetched record could not be mapped.
    #[error("Record mapping error: {0}")]
    Record(String),

    /// The client's health monitor tripped; large operations refuse to run.
    #[error("PRM client unhealthy after {consecutive_failures} consecutive failures")]
    Unhealthy { consecutive_failures: u32 },
}

impl PrmError {
    /// Builds an API error with the status-specific message text.
    #[must_use]
    pub fn api(status: u16, endpoint: &str) -> Self {
        Self::Api {
            status,
            endpoint: endpoint.to_string(),
            message: status_message(status).to_string(),
        }
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
        401 => "authentication failed, check the API credentials",
        403 => "permission denied for this object type",
        404 => "endpoint or record not found",
        429 => "rate limited by the PRM",
        500..=599 => "PRM is unavailable upstream",
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
    fn test_status_messages() {
        assert!(status_message(401).contains("authentication"));
        assert!(status_message(403).contains("permission"));
        assert!(status_message(404).contains("not found"));
        assert!(status_message(429).contains("rate limited"));
        assert!(status_message(503).contains("unavailable"));
    }

    #[test]
    fn test_body_snippet_truncates() {
        let long = "x".repeat(500);
        let snippet = body_snippet(&long);
        assert!(snippet.chars().count() <= 201);
        assert!(snippet.ends_with('…'));
        assert_eq!(body_snippet("short"), "short");
    }
}
