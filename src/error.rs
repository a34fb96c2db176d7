//! Error types surfaced by the handler.
//!
//! Every failure a table adapter can hit ends up as a [`HandlerError`]. Provider
//! messages are carried verbatim so callers see what Dune reported.

use std::time::Duration;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, HandlerError>;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Missing or rejected API key (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// HTTP 429; `retry_after` is the provider's hint when one was sent
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Unknown query or execution (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Execution finished remotely in a failed or cancelled state
    #[error("Execution {execution_id} failed ({state}): {message}")]
    ExecutionFailed {
        execution_id: String,
        state: String,
        message: String,
    },

    /// Execution results requested before the execution completed
    #[error("Execution {execution_id} is not finished yet (state: {state})")]
    ExecutionPending { execution_id: String, state: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered, but the body did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Any other non-success status
    #[error("Dune API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Select request the handler cannot serve
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HandlerError {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        HandlerError::InvalidQuery(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        HandlerError::MalformedResponse(msg.into())
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, HandlerError::Authentication(_))
    }
}

impl From<reqwest::Error> for HandlerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HandlerError::Timeout(err.to_string())
        } else if err.is_decode() {
            HandlerError::MalformedResponse(err.to_string())
        } else {
            HandlerError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::MalformedResponse(err.to_string())
    }
}
