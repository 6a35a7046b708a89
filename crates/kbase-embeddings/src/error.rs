//! Embedding error types.

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Transport-level failure (connection refused, DNS, TLS)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Service answered with a non-success status
    #[error("Embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Call exceeded its individual timeout
    #[error("Embedding call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Response body did not contain a usable vector
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector length disagrees with the rest of the batch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Whether the service asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EmbeddingError::Status { status, .. } if *status == 429 || *status == 503)
    }

    /// Whether the service could not be reached at all, as opposed to
    /// rejecting this particular text.
    pub fn is_transport(&self) -> bool {
        matches!(self, EmbeddingError::Http(_) | EmbeddingError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_classification() {
        let err = EmbeddingError::Status {
            status: 429,
            body: String::new(),
        };
        assert!(err.is_rate_limited());

        let err = EmbeddingError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert!(!err.is_rate_limited());
        assert_eq!(err.to_string(), "Embedding service returned 500: boom");
    }

    #[test]
    fn test_transport_classification() {
        assert!(EmbeddingError::Http("connection refused".to_string()).is_transport());
        assert!(EmbeddingError::Timeout(std::time::Duration::from_secs(1)).is_transport());
        assert!(!EmbeddingError::Status {
            status: 500,
            body: String::new(),
        }
        .is_transport());
        assert!(!EmbeddingError::DimensionMismatch {
            expected: 4,
            actual: 3,
        }
        .is_transport());
    }
}
