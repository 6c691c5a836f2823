use thiserror::Error;

/// Errors raised while talking to the playlist service.
///
/// The cache layer never produces these; it only forwards them from the
/// producer that failed, so callers always see the original failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, TLS, timeout...).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status code.
    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// The body could not be decoded into the expected shape.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    /// An id that would not address a single path segment (empty, `.` or `..`).
    #[error("invalid resource id '{0}'")]
    InvalidId(String),

    #[error("unsupported platform '{0}'")]
    UnsupportedPlatform(String),

    #[error("unknown job kind '{0}'")]
    UnknownJobKind(String),
}

impl ApiError {
    /// HTTP status of the failed call, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 404 responses, the usual sign of a job id that will never resolve.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        let err = ApiError::Status {
            url: "http://localhost/api/sync/status/42".to_string(),
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "http://localhost/api/sync/status/42 returned 404: not found"
        );

        let err = ApiError::UnsupportedPlatform("deezer".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_not_found());
    }
}
