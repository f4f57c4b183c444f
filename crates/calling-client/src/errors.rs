//! Calling service client error types.
//!
//! Transport failures are reported as [`HttpError`]. Operations wrap them into
//! an error scoped to what they act on: [`InstanceError`] for instance and
//! fleet operations, [`CallError`] for call operations. Callers tell the two
//! apart by type and by the embedded status code.

use thiserror::Error;

/// Failure of a single HTTP exchange with the calling service.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("{method} {url} failed before a response was received: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status} but the body could not be read: {source}")]
    BodyRead {
        method: String,
        url: String,
        status: u16,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "Not authorized by the calling service (401). Make sure basic authentication is configured correctly: {body}"
    )]
    Unauthorized { body: String },

    #[error("Request failed with status {status}, expected one of {expected:?}: {body}")]
    UnexpectedStatus {
        status: u16,
        expected: Vec<u16>,
        body: String,
    },
}

impl HttpError {
    /// Status code of the response, `None` if no response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::ClientBuild(_) | HttpError::Transport { .. } => None,
            HttpError::BodyRead { status, .. } | HttpError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            HttpError::Unauthorized { .. } => Some(401),
        }
    }

    /// Whether the calling service rejected the basic-auth credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HttpError::Unauthorized { .. })
    }
}

/// Failure of an instance-scoped operation (create, status, destroy,
/// diagnostics, fleet discovery).
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("Instance request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Failed to encode instance request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Unexpected instance response shape: {source} (body: {body})")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("Invalid live preview: {0}")]
    InvalidPreview(#[source] base64::DecodeError),
}

impl InstanceError {
    /// Status code of the failed response, `None` if none was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            InstanceError::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the calling service rejected the basic-auth credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, InstanceError::Http(e) if e.is_unauthorized())
    }
}

/// Failure of a call-scoped operation.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Call request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Failed to encode call request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Unexpected call response shape: {source} (body: {body})")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl CallError {
    /// Status code of the failed response, `None` if none was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the calling service rejected the basic-auth credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CallError::Http(e) if e.is_unauthorized())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_status_reports_code() {
        let err = HttpError::UnexpectedStatus {
            status: 503,
            expected: vec![200],
            body: "unavailable".to_string(),
        };

        assert_eq!(err.status(), Some(503));
        assert!(!err.is_unauthorized());
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("[200]"));
        assert!(msg.contains("unavailable"));
    }

    #[test]
    fn test_unauthorized_mentions_basic_auth() {
        let err = HttpError::Unauthorized {
            body: String::new(),
        };

        assert_eq!(err.status(), Some(401));
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("basic authentication"));
    }

    #[test]
    fn test_scoped_errors_forward_status() {
        let instance_err = InstanceError::from(HttpError::Unauthorized {
            body: String::new(),
        });
        assert_eq!(instance_err.status(), Some(401));
        assert!(instance_err.is_unauthorized());

        let call_err = CallError::from(HttpError::UnexpectedStatus {
            status: 404,
            expected: vec![200],
            body: String::new(),
        });
        assert_eq!(call_err.status(), Some(404));
        assert!(!call_err.is_unauthorized());
    }

    #[test]
    fn test_decode_errors_have_no_status() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CallError::Decode {
            source,
            body: "{".to_string(),
        };

        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("body: {"));
    }
}
