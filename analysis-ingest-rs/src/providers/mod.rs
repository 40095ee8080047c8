//! Provider adapters
//!
//! A provider turns a prompt into raw response text. The orchestrator treats
//! every provider the same way once text comes back; only transport details
//! differ between the local daemon and the remote API.

pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, TransportError};
use crate::model::ProviderKind;

pub use local::LocalProvider;
pub use remote::{RemoteProvider, RetryPolicy};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider kind this adapter talks to
    fn kind(&self) -> ProviderKind;

    /// Model identifier stamped onto produced records
    fn model(&self) -> String;

    /// Send one prompt and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String, TransportError>;
}

/// Build the adapter selected by configuration.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    match config.kind {
        ProviderKind::Local => Ok(Arc::new(LocalProvider::new(
            config.local_url.clone(),
            config.local_model.clone(),
        ))),
        ProviderKind::Remote => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| ConfigError::Missing("LLM_API_KEY".to_string()))?;
            Ok(Arc::new(RemoteProvider::new(
                config.api_url.clone(),
                api_key,
                config.remote_model.clone(),
                config.retry.clone(),
            )))
        }
    }
}
