use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::TallyError;

#[derive(Debug, Deserialize, Clone)]
pub struct TallyConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub stop: StopConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Who is running what. Echoed verbatim in every request body.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdentityConfig {
    pub developer_username: String,
    pub client_username: String,
    pub client_name: String,
    pub script_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            developer_username: String::new(),
            client_username: String::new(),
            client_name: "tally".to_string(),
            script_name: "unnamed".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportingConfig {
    pub interval_ms: u64,
    pub request_timeout_seconds: u64,
    pub signal_queue_capacity: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            request_timeout_seconds: 10,
            signal_queue_capacity: 32,
            max_retries: 3,
            retry_delay_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StopConfig {
    pub retry_interval_ms: u64,
    /// Unset means keep waiting until the host is safe to stop.
    pub max_attempts: Option<usize>,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 500,
            max_attempts: None,
        }
    }
}

impl TallyConfig {
    pub fn load(path: &str) -> Result<Self, TallyError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("TALLY").separator("__"))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, TallyError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    /// Minimal config pointing at `base_url`, everything else defaulted.
    pub fn for_endpoint(base_url: impl Into<String>) -> Self {
        Self {
            service: ServiceConfig {
                base_url: base_url.into(),
                token: String::new(),
                log_level: default_log_level(),
            },
            identity: IdentityConfig::default(),
            reporting: ReportingConfig::default(),
            stop: StopConfig::default(),
        }
    }
}
