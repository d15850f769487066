//! Environment-driven application configuration.

use crate::{ClientOptions, ConfigError, Mode};

pub const ENV_API_BASE_URL: &str = "API_BASE_URL";
pub const ENV_API_TIMEOUT_MS: &str = "API_TIMEOUT_MS";
pub const ENV_APP_MODE: &str = "APP_MODE";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_ENABLE_ANALYTICS: &str = "ENABLE_ANALYTICS";
pub const ENV_ENABLE_ERROR_REPORTING: &str = "ENABLE_ERROR_REPORTING";
pub const ENV_ENABLE_PERFORMANCE_MONITORING: &str = "ENABLE_PERFORMANCE_MONITORING";
pub const ENV_LOG_ENDPOINT: &str = "LOG_ENDPOINT";

/// Settings read once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    pub api_base_url: String,
    pub api_timeout_ms: u64,
    pub mode: Mode,
    /// `tracing` filter directive, e.g. `info` or `portal_api_client=debug`.
    pub log_level: String,
    pub enable_analytics: bool,
    pub enable_error_reporting: bool,
    pub enable_performance_monitoring: bool,
    /// Remote endpoint for shipped logs, if any.
    pub log_endpoint: Option<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_owned(),
            api_timeout_ms: ClientOptions::default().timeout_ms,
            mode: Mode::Production,
            log_level: "info".to_owned(),
            enable_analytics: false,
            enable_error_reporting: false,
            enable_performance_monitoring: false,
            log_endpoint: None,
        }
    }
}

impl EnvConfig {
    /// Reads the process environment.
    ///
    /// **Not available on `wasm32` targets**, which have no process
    /// environment; use [`EnvConfig::from_lookup`] there.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get(ENV_API_BASE_URL) {
            config.api_base_url = url;
        }
        if let Some(raw) = get(ENV_API_TIMEOUT_MS) {
            config.api_timeout_ms = raw.parse().map_err(|_| ConfigError::Invalid {
                key: ENV_API_TIMEOUT_MS,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get(ENV_APP_MODE) {
            config.mode = parse_mode(&raw).ok_or(ConfigError::Invalid {
                key: ENV_APP_MODE,
                value: raw.clone(),
            })?;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.enable_analytics = flag(&get, ENV_ENABLE_ANALYTICS)?;
        config.enable_error_reporting = flag(&get, ENV_ENABLE_ERROR_REPORTING)?;
        config.enable_performance_monitoring = flag(&get, ENV_ENABLE_PERFORMANCE_MONITORING)?;
        config.log_endpoint = get(ENV_LOG_ENDPOINT);

        Ok(config)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.api_base_url.clone(),
            timeout_ms: self.api_timeout_ms,
            mode: self.mode,
            ..ClientOptions::default()
        }
    }
}

fn parse_mode(raw: &str) -> Option<Mode> {
    match raw.to_ascii_lowercase().as_str() {
        "development" | "dev" => Some(Mode::Development),
        "production" | "prod" => Some(Mode::Production),
        _ => None,
    }
}

fn flag<G>(get: &G, key: &'static str) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(false),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}
