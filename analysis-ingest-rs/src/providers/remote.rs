//! Remote chat-completion API reached with bearer-token authentication
//!
//! Retryable failures (network errors, 408/429/5xx) are retried with
//! exponential backoff plus a small random jitter. Everything else is
//! returned on the first attempt.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::ProviderAdapter;
use crate::error::mapping::map_http_error;
use crate::error::TransportError;
use crate::model::ProviderKind;
use crate::prompt::SYSTEM_PROMPT;

/// Retry settings for the remote provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the extra random delay added to each backoff
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.5)
            .with_max_elapsed_time(None)
            .build()
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct RemoteProvider {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl RemoteProvider {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry,
        }
    }

    async fn execute_request(&self, request: &ChatCompletionRequest) -> Result<String, TransportError> {
        if self.api_key.is_empty() {
            return Err(TransportError::NotConfigured("API key is not set".to_string()));
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let data: ChatCompletionResponse = response.json().await.map_err(|err| {
            TransportError::InvalidResponse(format!("Failed to parse response: {}", err))
        })?;

        if let Some(usage) = &data.usage {
            debug!(total_tokens = usage.total_tokens, "Remote completion token usage");
        }

        let content = data
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                TransportError::InvalidResponse("No choices returned in response".to_string())
            })?;

        if content.trim().is_empty() {
            return Err(TransportError::InvalidResponse(
                "Remote provider returned empty content".to_string(),
            ));
        }
        Ok(content)
    }
}

#[async_trait]
impl ProviderAdapter for RemoteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Remote
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, prompt: &str) -> Result<String, TransportError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.2,
        };

        let mut backoff = self.retry.backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if attempt > 1 {
                info!(attempt, "Retrying remote completion");
            }

            let err = match self.execute_request(&request).await {
                Ok(content) => return Ok(content),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt > self.retry.max_retries {
                error!(attempts = attempt, error = %err, "Remote completion failed");
                return Err(err);
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    let delay = delay + self.retry.jitter();
                    warn!(error = %err, delay_ms = delay.as_millis() as u64, "Retryable provider error");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(error = %err, "Exceeded maximum backoff time");
                    return Err(err);
                }
            }
        }
    }
}
