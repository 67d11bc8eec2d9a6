//! Error types for the moderation client and streaming evaluator.

use thiserror::Error;

/// Errors from the classification client and its resilience wrapper.
///
/// Every variant except [`ClientError::MissingApiKey`] is recovered locally
/// into a fallback evaluation result; none of them reach facade callers as
/// errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, DNS, or transport failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The moderation endpoint answered with a non-2xx status.
    #[error("moderation endpoint returned status {status}")]
    Upstream {
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be deserialized. Treated as an upstream
    /// failure for fallback purposes.
    #[error("malformed moderation response: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// The response contained no results entry to consult.
    #[error("moderation response contained no results")]
    EmptyResponse,

    /// The request did not complete within the configured deadline.
    #[error("moderation request timed out after {0} ms")]
    Timeout(u64),

    /// The circuit breaker is open and refused the call.
    #[error("moderation circuit breaker is open")]
    CircuitOpen,

    /// No API key could be resolved from any configured source.
    #[error("no moderation API key configured")]
    MissingApiKey,
}

impl ClientError {
    /// Returns true if a retry could plausibly succeed.
    ///
    /// An open circuit is deliberately not retriable: it exists to stop
    /// retry traffic.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, ClientError::CircuitOpen | ClientError::MissingApiKey)
    }
}

/// Result type for classification calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by a streaming evaluator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamingError {
    /// The evaluator was used after `dispose()`. A programming-contract
    /// violation, surfaced to the caller rather than absorbed.
    #[error("streaming evaluator has been disposed")]
    Disposed,
}

/// Result type for streaming chunk evaluation.
pub type StreamingResult<T> = std::result::Result<T, StreamingError>;
