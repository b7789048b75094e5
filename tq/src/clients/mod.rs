//! Backend clients - the capability behind every task kind
//!
//! A task kind is backed by exactly one capability: send the payload to a
//! backend, get a string back. Everything else (lifecycle, events, durable
//! results) is the queue's business, not the client's.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

mod anthropic;
mod dummy;

pub use anthropic::AnthropicClient;
pub use dummy::DummyClient;

use crate::config::BackendConfig;

/// Errors a backend client can produce
///
/// `kind()` feeds the `error_type` field of a failed task's outcome.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The work itself failed - an application-level error from the backend
    #[error("{message}")]
    Execution { message: String, kind: String },

    /// Rate limited, retry after the given duration
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The backend returned a non-success HTTP status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No response within the deadline
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The backend answered with something we could not interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Short classification used as `error_type` in terminal outcomes
    pub fn kind(&self) -> &str {
        match self {
            Self::Execution { kind, .. } => kind,
            Self::RateLimited { .. } => "RateLimited",
            Self::Api { .. } => "ApiError",
            Self::Network(_) => "NetworkError",
            Self::Timeout(_) => "Timeout",
            Self::InvalidResponse(_) => "InvalidResponse",
        }
    }
}

/// Stateless message capability - one method, one round trip
///
/// Each call is independent; clients hold no conversation state. The queue
/// invokes this exactly once per task execution.
#[async_trait]
pub trait MessageClient: Send + Sync {
    /// Send a message to the backend and return its response
    async fn send_message(&self, message: &str) -> Result<String, ClientError>;
}

/// Create a client for the provider named in config
///
/// Supports "dummy" and "anthropic" providers.
pub fn create_client(config: &BackendConfig) -> Result<Arc<dyn MessageClient>, ClientError> {
    debug!(provider = %config.provider, "create_client: called");
    match config.provider.as_str() {
        "dummy" => Ok(Arc::new(DummyClient::new(Duration::from_millis(config.delay_ms)))),
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        other => Err(ClientError::InvalidResponse(format!(
            "Unknown backend provider: '{}'. Supported: dummy, anthropic",
            other
        ))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = ClientError::Execution {
            message: "Error".to_string(),
            kind: "Exception".to_string(),
        };
        assert_eq!(err.kind(), "Exception");
        assert_eq!(err.to_string(), "Error");

        assert_eq!(
            ClientError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .kind(),
            "RateLimited"
        );
        assert_eq!(ClientError::Timeout(Duration::from_secs(5)).kind(), "Timeout");
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let config = BackendConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(create_client(&config).is_err());
    }

    #[test]
    fn test_create_client_dummy() {
        let config = BackendConfig {
            provider: "dummy".to_string(),
            ..Default::default()
        };
        assert!(create_client(&config).is_ok());
    }
}
