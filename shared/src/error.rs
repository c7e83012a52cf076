//! Unified error type for the ingestion pipeline.
//!
//! One enum covers every failure class a shop cycle can hit, so the
//! orchestrator and the queue layer can decide retry policy from the
//! variant alone.

use thiserror::Error;

/// Service-wide error for ingestion work.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Network-level failure (timeout, reset, DNS). Retriable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Marketplace envelope carried a non-empty `error` field.
    #[error("API error [{code}]: {message}")]
    Api { code: String, message: String },

    /// Token refresh failed or no refresh token available. Fatal for the
    /// shop's current cycle.
    #[error("Token error: {0}")]
    Token(String),

    /// A response was missing a required field. The affected order is
    /// skipped, the batch continues.
    #[error("Data error: {0}")]
    Data(String),

    /// Transactional write failure. The order's transaction rolls back.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Missing company id, partner key or similar. Fail fast.
    #[error("Config error: {0}")]
    Config(String),
}

impl IngestError {
    /// Whether the current step may retry this error in place.
    ///
    /// Only transport failures and explicitly throttling-style API codes
    /// qualify; everything else surfaces to the queue immediately.
    pub fn is_retriable(&self) -> bool {
        match self {
            IngestError::Transport(_) => true,
            IngestError::Api { code, .. } => is_throttle_code(code),
            _ => false,
        }
    }

    /// Authentication-class API codes are fatal for the whole shop cycle.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            IngestError::Api { code, .. } => {
                code.starts_with("error_auth") || code == "error_permission"
            }
            IngestError::Token(_) => true,
            _ => false,
        }
    }
}

fn is_throttle_code(code: &str) -> bool {
    code == "error_request_limit" || code == "error_server" || code == "error_busy"
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        IngestError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Data(e.to_string())
    }
}

/// Result alias used across the server crates.
pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_retriable() {
        assert!(IngestError::Transport("timeout".into()).is_retriable());
        assert!(!IngestError::Token("no refresh token".into()).is_retriable());
    }

    #[test]
    fn test_throttle_codes_retriable() {
        let e = IngestError::Api {
            code: "error_request_limit".into(),
            message: "too many requests".into(),
        };
        assert!(e.is_retriable());

        let auth = IngestError::Api {
            code: "error_auth".into(),
            message: "bad sign".into(),
        };
        assert!(!auth.is_retriable());
        assert!(auth.is_auth_failure());
    }
}
