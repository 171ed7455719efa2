use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Maximum length for error response bodies in error messages
pub const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }

        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Status {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// HTTP status carried by this error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 401/403, the signal that the stored token is no longer accepted.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_short_body_kept() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, "missing");
        assert!(matches!(err, ApiError::Status { status: 404, ref body } if body == "missing"));
        assert_eq!(err.to_string(), "API request failed with status 404: missing");
    }

    #[test]
    fn test_long_body_truncated() {
        let body = "x".repeat(2000);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.ends_with("(truncated, 2000 total bytes)"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes, so byte 500 falls inside a character
        let body = format!("a{}", "é".repeat(400));
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("... (truncated"));
    }

    #[test]
    fn test_auth_rejection() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_auth_rejection());
        assert!(ApiError::from_status(StatusCode::FORBIDDEN, "").is_auth_rejection());
        assert!(!ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "").is_auth_rejection());

        let timeout = ApiError::Timeout {
            url: "http://x".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.status().is_none());
        assert!(!timeout.is_auth_rejection());
    }
}
