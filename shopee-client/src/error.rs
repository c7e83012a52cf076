//! Unified error type for the Shopee client.

use thiserror::Error;

/// Error for all client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request timed out.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Failed to establish or keep the connection.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Non-2xx HTTP status outside the envelope protocol.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The marketplace envelope carried a non-empty `error` field.
    #[error("API error [{code}]: {message}")]
    Api { code: String, message: String },

    /// Token grant or refresh failed.
    #[error("Token error: {0}")]
    Token(String),

    /// Response body could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid client configuration (empty partner key, etc.).
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Transient failures worth a bounded in-step retry.
    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::Timeout(_) | ClientError::Connection(_) => true,
            ClientError::Http { status, .. } => *status >= 500 || *status == 429,
            ClientError::Api { code, .. } => {
                code == "error_request_limit" || code == "error_server" || code == "error_busy"
            }
            _ => false,
        }
    }

    /// Authentication-class envelope codes; fatal for the shop cycle.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ClientError::Api { code, .. } => {
                code.starts_with("error_auth") || code == "error_permission"
            }
            ClientError::Token(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(e.to_string())
        } else if e.is_connect() {
            ClientError::Connection(e.to_string())
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Connection(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

impl From<ClientError> for shared::IngestError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Timeout(m) | ClientError::Connection(m) => {
                shared::IngestError::Transport(m)
            }
            ClientError::Http { status, body } => shared::IngestError::Transport(format!(
                "HTTP {status}: {body}"
            )),
            ClientError::Api { code, message } => shared::IngestError::Api { code, message },
            ClientError::Token(m) => shared::IngestError::Token(m),
            ClientError::Decode(m) => shared::IngestError::Data(m),
            ClientError::Config(m) => shared::IngestError::Config(m),
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(ClientError::Timeout("t".into()).is_retriable());
        assert!(ClientError::Http {
            status: 503,
            body: String::new()
        }
        .is_retriable());
        assert!(!ClientError::Http {
            status: 404,
            body: String::new()
        }
        .is_retriable());
        assert!(!ClientError::Decode("bad json".into()).is_retriable());
    }

    #[test]
    fn test_auth_codes_fatal() {
        let e = ClientError::Api {
            code: "error_auth".into(),
            message: "Invalid access_token".into(),
        };
        assert!(e.is_auth_failure());
        assert!(!e.is_retriable());
    }
}
