use serde::Deserialize;

use crate::queue::QueueConfig;

/// Top-level engine configuration, deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub queue: QueueConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
}

/// Scheduler configuration (channel capacity, housekeeping tick).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub command_channel_capacity: usize,
    /// Interval between reaper/promotion passes. Bounds how late an expired
    /// lease or a due delayed message becomes visible when nobody polls.
    pub tick_interval_ms: u64,
}

/// Where the on-disk backend keeps its files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            command_channel_capacity: 10_000,
            tick_interval_ms: 100,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

impl EngineConfig {
    /// Longest accepted queue name, in bytes.
    pub const MAX_QUEUE_NAME_LEN: usize = 255;

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.queue.name.is_empty() {
            return Err("queue.name must not be empty".to_string());
        }
        if self.queue.name.len() > Self::MAX_QUEUE_NAME_LEN {
            return Err(format!(
                "queue.name exceeds {} bytes",
                Self::MAX_QUEUE_NAME_LEN
            ));
        }
        if self.queue.lease_duration_ms == 0 {
            return Err("queue.lease_duration_ms must be positive".to_string());
        }
        if self.scheduler.command_channel_capacity == 0 {
            return Err("scheduler.command_channel_capacity must be positive".to_string());
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err("scheduler.tick_interval_ms must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = EngineConfig::default();
        assert_eq!(config.queue.name, "default");
        assert_eq!(config.queue.lease_duration_ms, 60_000);
        assert_eq!(config.scheduler.command_channel_capacity, 10_000);
        assert_eq!(config.scheduler.tick_interval_ms, 100);
        assert_eq!(config.storage.data_dir, "data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_parsing_with_overrides() {
        let toml_str = r#"
            [queue]
            name = "orca"
            lease_duration_ms = 10000

            [scheduler]
            command_channel_capacity = 500
            tick_interval_ms = 50

            [storage]
            data_dir = "/var/lib/dynoq"
        "#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.queue.name, "orca");
        assert_eq!(config.queue.lease_duration_ms, 10_000);
        assert_eq!(config.scheduler.command_channel_capacity, 500);
        assert_eq!(config.scheduler.tick_interval_ms, 50);
        assert_eq!(config.storage.data_dir, "/var/lib/dynoq");
    }

    #[test]
    fn toml_parsing_empty_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.queue.lease_duration_ms, 60_000);
        assert_eq!(config.scheduler.tick_interval_ms, 100);
    }

    #[test]
    fn toml_parsing_partial_config() {
        let toml_str = r#"
            [queue]
            name = "events"
        "#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.queue.name, "events");
        // Lease and scheduler defaults preserved
        assert_eq!(config.queue.lease_duration_ms, 60_000);
        assert_eq!(config.scheduler.command_channel_capacity, 10_000);
    }

    #[test]
    fn validate_rejects_zero_lease() {
        let mut config = EngineConfig::default();
        config.queue.lease_duration_ms = 0;
        assert!(config.validate().unwrap_err().contains("lease_duration_ms"));
    }

    #[test]
    fn validate_rejects_bad_names() {
        let mut config = EngineConfig::default();
        config.queue.name = String::new();
        assert!(config.validate().is_err());
        config.queue.name = "x".repeat(EngineConfig::MAX_QUEUE_NAME_LEN + 1);
        assert!(config.validate().is_err());
    }
}
