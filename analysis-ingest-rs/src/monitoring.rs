//! External monitoring enrichment
//!
//! Best-effort only: every failure is reported as [`MonitoringUnavailable`]
//! and the orchestrator simply leaves monitoring context out of the prompt.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MonitoringUnavailable;

/// Aggregate alert picture for one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringContext {
    #[serde(default)]
    pub total_alerts: u64,
    #[serde(default)]
    pub alerts_by_severity: BTreeMap<String, u64>,
    #[serde(default)]
    pub top_patterns: Vec<AlertPattern>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPattern {
    pub pattern: String,
    #[serde(default)]
    pub count: u64,
}

impl fmt::Display for MonitoringContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total alerts: {}", self.total_alerts)?;
        if !self.alerts_by_severity.is_empty() {
            let severities: Vec<String> = self
                .alerts_by_severity
                .iter()
                .map(|(severity, count)| format!("{}={}", severity, count))
                .collect();
            write!(f, "\nBy severity: {}", severities.join(", "))?;
        }
        for pattern in &self.top_patterns {
            write!(f, "\n- {} ({} alerts)", pattern.pattern, pattern.count)?;
        }
        Ok(())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MonitoringSource: Send + Sync {
    async fn fetch(&self, execution_id: &str) -> Result<MonitoringContext, MonitoringUnavailable>;
}

/// Monitoring service client: `GET {base}/executions/{id}/summary`.
#[derive(Debug, Clone)]
pub struct HttpMonitoringClient {
    client: Client,
    base_url: String,
}

impl HttpMonitoringClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MonitoringSource for HttpMonitoringClient {
    async fn fetch(&self, execution_id: &str) -> Result<MonitoringContext, MonitoringUnavailable> {
        let url = format!("{}/executions/{}/summary", self.base_url, execution_id);
        debug!(url = %url, "Fetching monitoring context");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MonitoringUnavailable(format!(
                "monitoring service returned HTTP {}",
                status.as_u16()
            )));
        }

        Ok(response.json::<MonitoringContext>().await?)
    }
}
