//! # Ingestion Orchestrator
//!
//! Public surface of the crate. [`AnalysisOrchestrator::analyze`] never fails:
//! provider transport errors, timeouts and unparseable responses all resolve
//! to a fallback record, which is cached like any other result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::{FileStore, KeyValueStore, MemoryStore, ResultCache, RULESET_VERSION};
use crate::clock::{Clock, SystemClock};
use crate::config::IngestConfig;
use crate::error::{ConfigError, FailureReason, TransportError};
use crate::fallback::build_fallback;
use crate::model::{AnalysisRecord, Execution, RecordMeta};
use crate::monitoring::{HttpMonitoringClient, MonitoringContext, MonitoringSource};
use crate::prompt::build_prompt;
use crate::providers::{build_provider, ProviderAdapter};
use crate::repair;

pub struct AnalysisOrchestrator {
    provider: Arc<dyn ProviderAdapter>,
    monitoring: Option<Arc<dyn MonitoringSource>>,
    cache: Arc<ResultCache>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AnalysisOrchestrator {
    /// Build an orchestrator around an existing cache.
    ///
    /// The dispatch timeout defaults to the provider kind's bound. The cache's
    /// ruleset version is checked once here.
    pub fn new(provider: Arc<dyn ProviderAdapter>, cache: Arc<ResultCache>, clock: Arc<dyn Clock>) -> Self {
        let timeout = provider.kind().default_timeout();
        cache.check_version();
        Self {
            provider,
            monitoring: None,
            cache,
            clock,
            timeout,
        }
    }

    pub fn with_monitoring(mut self, source: Arc<dyn MonitoringSource>) -> Self {
        self.monitoring = Some(source);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wire up provider, persistent cache and monitoring from configuration.
    pub fn from_config(config: &IngestConfig) -> Result<Self, ConfigError> {
        let provider = build_provider(&config.provider)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store: Arc<dyn KeyValueStore> = if config.cache.persist {
            let store = FileStore::new(&config.cache.dir).map_err(|e| {
                ConfigError::Invalid(format!(
                    "ANALYSIS_CACHE_DIR '{}': {}",
                    config.cache.dir.display(),
                    e
                ))
            })?;
            Arc::new(store)
        } else {
            Arc::new(MemoryStore::new())
        };

        let cache = Arc::new(ResultCache::new(
            store,
            Arc::clone(&clock),
            config.cache.limits.clone(),
            RULESET_VERSION,
        ));

        let mut orchestrator =
            Self::new(provider, cache, clock).with_timeout(config.provider.timeout());
        if let Some(url) = &config.monitoring.url {
            orchestrator = orchestrator.with_monitoring(Arc::new(HttpMonitoringClient::new(
                url.clone(),
                config.monitoring.timeout,
            )));
        }
        Ok(orchestrator)
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Analyze an execution, serving from cache when possible.
    pub async fn analyze(&self, execution: &Execution, monitoring_included: bool) -> AnalysisRecord {
        let analysis_id = Uuid::new_v4();
        let span = info_span!(
            "analyze",
            %analysis_id,
            execution_id = %execution.id,
            monitoring_included
        );

        async {
            if let Some(record) = self.cache.get(&execution.id, monitoring_included) {
                debug!("Serving cached analysis");
                return record;
            }
            self.run(execution, monitoring_included).await
        }
        .instrument(span)
        .await
    }

    /// Analyze without consulting the cache; the result still replaces any
    /// cached entry.
    pub async fn refresh(&self, execution: &Execution, monitoring_included: bool) -> AnalysisRecord {
        let analysis_id = Uuid::new_v4();
        let span = info_span!(
            "refresh",
            %analysis_id,
            execution_id = %execution.id,
            monitoring_included
        );
        self.run(execution, monitoring_included).instrument(span).await
    }

    pub fn get_cached(&self, execution_id: &str, monitoring_included: bool) -> Option<AnalysisRecord> {
        self.cache.get(execution_id, monitoring_included)
    }

    pub fn invalidate(&self, execution_id: &str) {
        self.cache.invalidate(execution_id);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Start the cache's background sweep and version check.
    pub fn start_maintenance(&self, interval: Duration) -> JoinHandle<()> {
        Arc::clone(&self.cache).spawn_maintenance(interval)
    }

    async fn run(&self, execution: &Execution, monitoring_included: bool) -> AnalysisRecord {
        let context = if monitoring_included {
            self.fetch_monitoring(&execution.id).await
        } else {
            None
        };

        let prompt = build_prompt(execution, context.as_ref());
        let meta = RecordMeta {
            generated_at: self.clock.now(),
            provider_id: self.provider.kind(),
            model_id: self.provider.model(),
        };

        let record = match self.dispatch(&prompt, &meta).await {
            Ok(mut record) => {
                if record.external_monitoring_summary.is_none() {
                    record.external_monitoring_summary = context.as_ref().map(ToString::to_string);
                }
                record
            }
            Err(reason) => {
                match &reason {
                    FailureReason::Transport(err) => {
                        error!(error = %err, kind = err.kind(), "Provider dispatch failed; using fallback")
                    }
                    FailureReason::Parse(err) => {
                        warn!(error = %err, excerpt = %err.excerpt, "Model response unparseable; using fallback")
                    }
                }
                let mut fallback = build_fallback(execution, &reason, &meta);
                fallback.external_monitoring_summary = context.as_ref().map(ToString::to_string);
                fallback
            }
        };

        self.cache.put(&execution.id, monitoring_included, &record);
        record
    }

    async fn dispatch(&self, prompt: &str, meta: &RecordMeta) -> Result<AnalysisRecord, FailureReason> {
        let provider = self.provider.kind();
        let started = Instant::now();

        let raw = match tokio::time::timeout(self.timeout, self.provider.complete(prompt)).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(self.timeout).into()),
        };

        info!(
            %provider,
            elapsed_ms = started.elapsed().as_millis() as u64,
            response_chars = raw.chars().count(),
            "Provider responded"
        );

        Ok(repair::parse_with(&raw, meta)?)
    }

    async fn fetch_monitoring(&self, execution_id: &str) -> Option<MonitoringContext> {
        let source = match &self.monitoring {
            Some(source) => source,
            None => {
                debug!("Monitoring requested but no source is configured");
                return None;
            }
        };

        match source.fetch(execution_id).await {
            Ok(context) => Some(context),
            Err(err) => {
                warn!(error = %err, "Monitoring context unavailable; continuing without it");
                None
            }
        }
    }
}
