//! config-rs/lib.rs
//! Shared configuration utilities for consistent environment-driven settings
//! Provides typed lookups with fallbacks for the analysis ingestion crates

use std::env;
use std::str::FromStr;
use std::sync::Once;
use std::time::Duration;

static DOTENV: Once = Once::new();

/// Load variables from a `.env` file in the working directory, once per process.
///
/// A missing file is not an error; the process environment is used as-is.
pub fn load_dotenv() {
    DOTENV.call_once(|| match dotenv::dotenv() {
        Ok(path) => log::debug!("Loaded environment overrides from {}", path.display()),
        Err(_) => log::debug!("No .env file found, using process environment"),
    });
}

/// Read an environment variable and parse it, falling back to `default`.
///
/// # Arguments
/// * `name` - The environment variable name (e.g., "LLM_MAX_RETRIES")
/// * `default` - Value used when the variable is unset or malformed
///
/// # Returns
/// The parsed value, or the default
pub fn get_env_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid value {:?} in {}, using default", raw, name);
                default
            }
        },
        Err(_) => default,
    }
}

/// Read a string variable with a default.
pub fn get_env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read an optional string variable; empty values count as unset.
pub fn get_env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a boolean variable. Accepts true/yes/1/on and false/no/0/off.
pub fn get_env_bool(name: &str, default: bool) -> bool {
    match get_env_opt(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => true,
            "false" | "no" | "0" | "off" => false,
            _ => {
                log::warn!("Invalid boolean {:?} in {}, using default {}", raw, name, default);
                default
            }
        },
        None => default,
    }
}

/// Read a duration expressed in whole seconds.
pub fn get_env_duration_secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(get_env_var(name, default.as_secs()))
}

/// Read a duration expressed in milliseconds.
pub fn get_env_duration_ms(name: &str, default: Duration) -> Duration {
    Duration::from_millis(get_env_var(name, default.as_millis() as u64))
}

/// Read an optional duration in seconds; unset or malformed yields `None`.
pub fn get_env_opt_duration_secs(name: &str) -> Option<Duration> {
    get_env_opt(name).and_then(|raw| match raw.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            log::warn!("Invalid duration {:?} in {}, ignoring", raw, name);
            None
        }
    })
}
