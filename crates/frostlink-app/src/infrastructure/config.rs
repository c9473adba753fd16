//! Application configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing or
//! partial file still yields a runnable configuration.  The defaults match
//! the appliance firmware's fixed topic names and timing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub topics: TopicSettings,
    #[serde(default)]
    pub liveness: LivenessSettings,
    #[serde(default)]
    pub provisioning: ProvisioningSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    #[serde(default = "default_broker_url")]
    pub url: String,
    /// Generated when absent so concurrent instances never collide.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSettings {
    #[serde(default = "default_control_topic")]
    pub control: String,
    #[serde(default = "default_telemetry_topic")]
    pub telemetry: String,
    #[serde(default = "default_status_topic")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessSettings {
    #[serde(default = "default_window_ticks")]
    pub window_ticks: u32,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningSettings {
    /// Advertised names must start with this to count as an appliance.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
}

fn default_broker_url() -> String {
    "localhost:1883".to_string()
}

fn default_keep_alive_secs() -> u64 {
    5
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_control_topic() -> String {
    "Control".to_string()
}

fn default_telemetry_topic() -> String {
    "Temp".to_string()
}

fn default_status_topic() -> String {
    "Estado".to_string()
}

fn default_window_ticks() -> u32 {
    20
}

fn default_tick_interval_secs() -> u64 {
    1
}

fn default_name_prefix() -> String {
    "TK".to_string()
}

fn default_scan_timeout_secs() -> u64 {
    7
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            client_id: None,
            username: String::new(),
            password: String::new(),
            keep_alive_secs: default_keep_alive_secs(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            control: default_control_topic(),
            telemetry: default_telemetry_topic(),
            status: default_status_topic(),
        }
    }
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            window_ticks: default_window_ticks(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            scan_timeout_secs: default_scan_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            info!(path = %path.display(), "loading configuration");
            Self::load(path)
        } else {
            info!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// The configured client id, or a fresh generated one.
    pub fn effective_client_id(&self) -> String {
        match &self.broker.client_id {
            Some(id) => id.clone(),
            None => format!("app-{}", Uuid::new_v4().simple()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_appliance_contract() {
        let config = AppConfig::default();
        assert_eq!(config.topics.control, "Control");
        assert_eq!(config.topics.telemetry, "Temp");
        assert_eq!(config.topics.status, "Estado");
        assert_eq!(config.broker.retry_delay_secs, 5);
        assert_eq!(config.liveness.window_ticks, 20);
        assert_eq!(config.liveness.tick_interval_secs, 1);
        assert_eq!(config.provisioning.name_prefix, "TK");
        assert_eq!(config.provisioning.scan_timeout_secs, 7);
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let text = r#"
            [broker]
            url = "10.0.0.5:1884"
            username = "frost"
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert_eq!(config.broker.url, "10.0.0.5:1884");
        assert_eq!(config.broker.username, "frost");
        assert_eq!(config.broker.keep_alive_secs, 5);
        assert_eq!(config.topics.telemetry, "Temp");
    }

    #[test]
    fn test_generated_client_ids_are_unique() {
        let config = AppConfig::default();
        let a = config.effective_client_id();
        let b = config.effective_client_id();
        assert!(a.starts_with("app-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_explicit_client_id_wins() {
        let mut config = AppConfig::default();
        config.broker.client_id = Some("kiosk-7".to_string());
        assert_eq!(config.effective_client_id(), "kiosk-7");
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = std::env::temp_dir().join(format!("frostlink-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let mut config = AppConfig::default();
        config.broker.url = "broker.lan:1883".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.broker.url, "broker.lan:1883");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
