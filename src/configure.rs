use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ScyllaDbConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub connection_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
    /// Queue status poll cadence (seconds). Kept at 30 to match the
    /// refresh interval the frontend used to drive itself.
    pub queue_poll_interval_secs: u64,
    /// Cadence for the reconciliation / settlement scan loops (seconds).
    pub scan_interval_secs: u64,
    pub scylladb: Option<ScyllaDbConfig>,
}

fn base_builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        // Set defaults
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("log_file", "log/buyback.log")?
        .set_default("queue_poll_interval_secs", 30_i64)?
        .set_default("scan_interval_secs", 300_i64)
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let s = base_builder()?
        // Add configuration from a file
        .add_source(File::with_name("config/config.yaml"))
        // Add configuration from environment variables
        .add_source(config::Environment::with_prefix("APP"))
        .build()?;

    s.try_deserialize()
}

/// Load a per-service config file from config/<name>.yaml.
/// Falls back to defaults + env when the file is absent.
pub fn load_service_config(name: &str) -> Result<AppConfig, ConfigError> {
    let s = base_builder()?
        .add_source(File::with_name(&format!("config/{}", name)).required(false))
        .add_source(config::Environment::with_prefix("APP"))
        .build()?;

    s.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let config = load_service_config("does_not_exist").expect("defaults should load");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.queue_poll_interval_secs, 30);
        assert!(config.scylladb.is_none());
    }
}
