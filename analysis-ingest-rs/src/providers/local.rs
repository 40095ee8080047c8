//! Local model daemon reached over plain HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProviderAdapter;
use crate::error::mapping::map_http_error;
use crate::error::TransportError;
use crate::model::ProviderKind;
use crate::prompt::SYSTEM_PROMPT;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Clone)]
pub struct LocalProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl LocalProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        // The dispatch timeout is enforced by the orchestrator
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl ProviderAdapter for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, prompt: &str) -> Result<String, TransportError> {
        let endpoint = self.endpoint();
        debug!(endpoint = %endpoint, model = %self.model, "Dispatching prompt to local daemon");

        let response = self
            .client
            .post(&endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                system: SYSTEM_PROMPT,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let body: GenerateResponse = response.json().await.map_err(|err| {
            TransportError::InvalidResponse(format!("Failed to decode daemon response: {}", err))
        })?;

        if body.response.trim().is_empty() {
            return Err(TransportError::InvalidResponse(
                "Local daemon returned an empty response".to_string(),
            ));
        }
        Ok(body.response)
    }
}
