use thiserror::Error;

/// The parsed model output could not be coerced into the analysis schema.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("expected a JSON object at the top level, found {0}")]
    NotAnObject(&'static str),
}

/// Errors from the external model call.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The completion carried no message content.
    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("could not decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The analyzer cannot serve requests at all.
    #[error("analyzer unavailable: {0}")]
    Unavailable(String),
}

impl AnalyzerError {
    /// Returns `true` for errors worth retrying after a back-off delay:
    /// timeouts, connection failures, 5xx and 429 responses.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            AnalyzerError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            AnalyzerError::Status { status, .. } => *status >= 500 || *status == 429,
            AnalyzerError::EmptyResponse
            | AnalyzerError::Decode { .. }
            | AnalyzerError::Unavailable(_) => false,
        }
    }
}

/// Opaque failure reported by a storage adapter.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// A whole batch failed before producing any per-note output.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("upstream analyzer failed before the batch started: {0}")]
    Upstream(#[from] AnalyzerError),

    #[error("storage read failed: {0}")]
    Store(#[from] StoreError),
}

/// The sentiment synonym table could not be loaded.
#[derive(Debug, Error)]
pub enum SynonymTableError {
    #[error("failed to read synonym table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse synonym table {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retriable() {
        let err = AnalyzerError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn rate_limit_is_retriable() {
        let err = AnalyzerError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn client_errors_are_not_retriable() {
        let err = AnalyzerError::Status {
            status: 401,
            body: "bad key".to_string(),
        };
        assert!(!err.is_retriable());
    }

    #[test]
    fn store_read_failure_becomes_batch_error() {
        let err = BatchError::from(StoreError::new("connection refused"));
        assert!(matches!(err, BatchError::Store(_)));
        assert_eq!(err.to_string(), "storage read failed: connection refused");
    }

    #[test]
    fn empty_response_is_not_retriable() {
        assert!(!AnalyzerError::EmptyResponse.is_retriable());
    }

    #[test]
    fn decode_error_is_not_retriable() {
        let source = serde_json::from_str::<()>("invalid").unwrap_err();
        let err = AnalyzerError::Decode {
            context: "completion".to_string(),
            source,
        };
        assert!(!err.is_retriable());
    }
}
