//! Dummy backend - a stand-in for a slow text-generation service
//!
//! Sleeps for a configurable delay, then either fails (when the message asks
//! for it) or answers with a canned response picked deterministically from
//! the message, so tests can assert on output without mocking.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ClientError, MessageClient};

/// Simulated backend client
pub struct DummyClient {
    delay: Duration,
}

impl DummyClient {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Deterministic choice among the canned responses
    fn pick_response(message: &str) -> String {
        let responses = [
            format!("Random response to: {message}"),
            format!("Here's a dummy reply for: {message}"),
            format!("Generated response about: {message}"),
        ];
        let hash: usize = message.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        responses[hash % responses.len()].clone()
    }
}

#[async_trait]
impl MessageClient for DummyClient {
    async fn send_message(&self, message: &str) -> Result<String, ClientError> {
        debug!(delay_ms = self.delay.as_millis() as u64, "DummyClient::send_message");
        tokio::time::sleep(self.delay).await;

        // Messages containing "error" simulate a backend failure
        if message.contains("error") {
            return Err(ClientError::Execution {
                message: "Error".to_string(),
                kind: "Exception".to_string(),
            });
        }

        Ok(Self::pick_response(message))
    }
}
