//! Loads and validates logd's YAML process configuration. Unknown top-level
//! fields anywhere in the document are rejected rather than silently
//! ignored.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub udp: UdpSettings,
    pub store: StoreSettings,
    pub status: StatusSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UdpSettings {
    pub laddr_port: String,
    pub worker_pool_size: usize,
    pub secrets: SecretsSettings,
    pub guard: GuardSettings,
    pub tail_rate_limit: RateLimitSettings,
    pub query_rate_limit: RateLimitSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretsSettings {
    pub read: String,
    pub write: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardSettings {
    pub filter_cap: usize,
    #[serde(with = "humantime_serde")]
    pub filter_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub packet_ttl: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSettings {
    #[serde(with = "humantime_serde")]
    pub every: Duration,
    pub burst: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    pub ring_sizes: HashMap<String, usize>,
    pub fallback_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusSettings {
    pub laddr_port: String,
    pub rate_limit: RateLimitSettings,
    pub access_control_allow_origin: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Loads and validates `path`. A structurally invalid document or one
/// carrying a field not named above is rejected, never silently ignored.
pub fn load(path: &str) -> Result<Settings, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}
