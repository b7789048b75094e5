//! Anthropic Messages API client
//!
//! The real text-generation backend: one user message in, the first text
//! block of the reply out. Transient failures are retried with exponential
//! backoff; a 429 is surfaced as `ClientError::RateLimited` so the caller can
//! decide what a rate limit means for the task.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ClientError, MessageClient};
use crate::config::BackendConfig;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 500 | 502 | 503 | 504 | 529)
}

/// Backoff for the given attempt: exponential with a little jitter
fn backoff_for(attempt: u32) -> Duration {
    let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
    let jitter = rand::rng().random_range(0..=base / 4);
    Duration::from_millis(base + jitter)
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &BackendConfig) -> Result<Self, ClientError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ClientError::InvalidResponse(format!(
                "API key not found: set the {} environment variable",
                config.api_key_env
            ))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request_body(&self, message: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": message }],
        })
    }

    /// Pull the first text block out of the API response
    fn extract_text(response: ApiResponse) -> Result<String, ClientError> {
        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ApiContentBlock::Text { text } => Some(text),
            })
            .ok_or_else(|| ClientError::InvalidResponse("response contained no text block".to_string()))
    }
}

#[async_trait]
impl MessageClient for AnthropicClient {
    async fn send_message(&self, message: &str) -> Result<String, ClientError> {
        debug!(model = %self.model, "AnthropicClient::send_message");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(message);

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = backoff_for(attempt);
                warn!(attempt, backoff_ms = backoff.as_millis() as u64, "retrying after transient error");
                tokio::time::sleep(backoff).await;
            }

            let response = match self
                .http
                .post(url.clone())
                .header("x-api-key", self.api_key.clone())
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "send_message: network error");
                    last_error = Some(ClientError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);

                return Err(ClientError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "send_message: retryable error");
                last_error = Some(ClientError::Api { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ClientError::Api { status, message: text });
            }

            let parsed: ApiResponse = response
                .json()
                .await
                .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

            return Self::extract_text(parsed);
        }

        Err(last_error.unwrap_or_else(|| ClientError::InvalidResponse("retries exhausted".to_string())))
    }
}

/// Subset of the Messages API response we care about
#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 500, 502, 503, 504, 529] {
            assert!(is_retryable_status(status), "{status} should be retryable");
        }
        for status in [200, 400, 401, 404, 429] {
            assert!(!is_retryable_status(status), "{status} should not be retryable");
        }
    }

    #[test]
    fn test_backoff_grows() {
        let first = backoff_for(1);
        let third = backoff_for(3);
        assert!(first >= Duration::from_millis(INITIAL_BACKOFF_MS));
        assert!(third >= Duration::from_millis(INITIAL_BACKOFF_MS * 4));
    }

    #[test]
    fn test_extract_text() {
        let response = ApiResponse {
            content: vec![ApiContentBlock::Text {
                text: "hello".to_string(),
            }],
        };
        assert_eq!(AnthropicClient::extract_text(response).unwrap(), "hello");

        let empty = ApiResponse { content: vec![] };
        assert!(AnthropicClient::extract_text(empty).is_err());
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"content":[{"type":"text","text":"generated"}],"model":"m"}"#;
        let parsed: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(AnthropicClient::extract_text(parsed).unwrap(), "generated");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = BackendConfig {
            api_key_env: "TQ_TEST_KEY_THAT_DOES_NOT_EXIST".to_string(),
            ..Default::default()
        };
        assert!(AnthropicClient::from_config(&config).is_err());
    }
}
