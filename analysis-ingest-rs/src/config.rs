//! Configuration assembled from the environment
//!
//! Every setting has a default; only `LLM_API_KEY` is mandatory, and only when
//! the remote provider is selected.

use std::path::PathBuf;
use std::time::Duration;

use config_rs::{
    get_env_bool, get_env_duration_ms, get_env_duration_secs, get_env_opt,
    get_env_opt_duration_secs, get_env_string, get_env_var, load_dotenv,
};

use crate::cache::CacheLimits;
use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::model::ProviderKind;
use crate::providers::RetryPolicy;

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3";
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_REMOTE_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CACHE_DIR: &str = "./.analysis-cache";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub local_url: String,
    pub local_model: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub remote_model: String,
    pub retry: RetryPolicy,
    /// Overrides the per-kind dispatch timeout when set
    pub timeout_override: Option<Duration>,
}

impl ProviderConfig {
    /// Effective upper bound on one provider dispatch.
    pub fn timeout(&self) -> Duration {
        self.timeout_override
            .unwrap_or_else(|| self.kind.default_timeout())
    }
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Base URL of the monitoring service; `None` disables enrichment
    pub url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub limits: CacheLimits,
    pub sweep_interval: Duration,
    /// When false the cache lives in memory only
    pub persist: bool,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub provider: ProviderConfig,
    pub monitoring: MonitoringConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl IngestConfig {
    /// Load `.env` (if present) and read every setting from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        let provider_name = get_env_string("ANALYSIS_PROVIDER", "local");
        let kind = ProviderKind::parse(&provider_name).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "ANALYSIS_PROVIDER must be 'local' or 'remote', got '{}'",
                provider_name
            ))
        })?;

        let retry_defaults = RetryPolicy::default();
        let provider = ProviderConfig {
            kind,
            local_url: get_env_string("LOCAL_LLM_URL", DEFAULT_LOCAL_URL),
            local_model: get_env_string("LOCAL_LLM_MODEL", DEFAULT_LOCAL_MODEL),
            api_url: get_env_string("LLM_API_URL", DEFAULT_API_URL),
            api_key: get_env_opt("LLM_API_KEY"),
            remote_model: get_env_string("LLM_MODEL", DEFAULT_REMOTE_MODEL),
            retry: RetryPolicy {
                max_retries: get_env_var("LLM_MAX_RETRIES", retry_defaults.max_retries),
                initial_delay: get_env_duration_ms(
                    "LLM_INITIAL_RETRY_DELAY_MS",
                    retry_defaults.initial_delay,
                ),
                max_delay: get_env_duration_ms("LLM_MAX_RETRY_DELAY_MS", retry_defaults.max_delay),
                max_jitter: retry_defaults.max_jitter,
            },
            timeout_override: get_env_opt_duration_secs("ANALYSIS_PROVIDER_TIMEOUT_SECS"),
        };

        if provider.kind == ProviderKind::Remote && provider.api_key.is_none() {
            return Err(ConfigError::Missing("LLM_API_KEY".to_string()));
        }

        let monitoring = MonitoringConfig {
            url: get_env_opt("MONITORING_URL"),
            timeout: get_env_duration_secs("MONITORING_TIMEOUT_SECS", Duration::from_secs(10)),
        };

        let limit_defaults = CacheLimits::default();
        let ttl_hours: i64 = get_env_var("ANALYSIS_CACHE_TTL_HOURS", 24);
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid(format!(
                "ANALYSIS_CACHE_TTL_HOURS must be positive, got {}",
                ttl_hours
            )));
        }
        let cache = CacheConfig {
            dir: PathBuf::from(get_env_string("ANALYSIS_CACHE_DIR", DEFAULT_CACHE_DIR)),
            limits: CacheLimits {
                max_entries: get_env_var("ANALYSIS_CACHE_MAX_ENTRIES", limit_defaults.max_entries),
                max_bytes: get_env_var("ANALYSIS_CACHE_MAX_BYTES", limit_defaults.max_bytes),
                ttl: chrono::Duration::hours(ttl_hours),
                ..limit_defaults
            },
            sweep_interval: get_env_duration_secs("ANALYSIS_CACHE_SWEEP_SECS", Duration::from_secs(300)),
            persist: get_env_bool("ANALYSIS_CACHE_PERSIST", true),
        };

        let logging = LoggingConfig {
            level: get_env_string("LOG_LEVEL", "info"),
            json_format: get_env_string("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            ..LoggingConfig::default()
        };

        Ok(Self {
            provider,
            monitoring,
            cache,
            logging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "ANALYSIS_PROVIDER",
        "LLM_API_KEY",
        "LLM_MAX_RETRIES",
        "ANALYSIS_PROVIDER_TIMEOUT_SECS",
        "ANALYSIS_CACHE_MAX_ENTRIES",
        "ANALYSIS_CACHE_TTL_HOURS",
        "MONITORING_URL",
        "LOG_FORMAT",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    // Single test so environment mutations never race each other
    #[test]
    fn test_from_env() {
        clear();

        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Local);
        assert_eq!(config.provider.timeout(), Duration::from_secs(600));
        assert_eq!(config.cache.limits.max_entries, 1000);
        assert_eq!(config.cache.limits.ttl, chrono::Duration::hours(24));
        assert!(config.monitoring.url.is_none());
        assert!(!config.logging.json_format);

        std::env::set_var("ANALYSIS_PROVIDER", "remote");
        assert_eq!(
            IngestConfig::from_env().unwrap_err(),
            ConfigError::Missing("LLM_API_KEY".to_string())
        );

        std::env::set_var("LLM_API_KEY", "sk-test");
        std::env::set_var("LLM_MAX_RETRIES", "not-a-number");
        std::env::set_var("ANALYSIS_PROVIDER_TIMEOUT_SECS", "45");
        std::env::set_var("ANALYSIS_CACHE_MAX_ENTRIES", "50");
        std::env::set_var("MONITORING_URL", "http://monitor.local");
        std::env::set_var("LOG_FORMAT", "JSON");
        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Remote);
        assert_eq!(config.provider.retry.max_retries, 3);
        assert_eq!(config.provider.timeout(), Duration::from_secs(45));
        assert_eq!(config.cache.limits.max_entries, 50);
        assert_eq!(config.monitoring.url.as_deref(), Some("http://monitor.local"));
        assert!(config.logging.json_format);

        std::env::set_var("ANALYSIS_CACHE_TTL_HOURS", "0");
        assert!(matches!(IngestConfig::from_env(), Err(ConfigError::Invalid(_))));

        std::env::set_var("ANALYSIS_PROVIDER", "cloud");
        assert!(matches!(IngestConfig::from_env(), Err(ConfigError::Invalid(_))));

        clear();
    }
}
