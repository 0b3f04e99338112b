/// Player configuration
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Played items the engine keeps open for quick back-navigation
    #[serde(default = "default_max_played_items")]
    pub max_played_items_to_keep_open: u32,

    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// Capacity of each listener channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(default = "default_device_resolver_thread")]
    pub device_resolver_thread: String,

    /// How long a handle waits for the owner thread to answer a call
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Largest number of items a queue may hold after expanding playlists
    #[serde(default = "default_max_queue_items")]
    pub max_queue_items: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_played_items_to_keep_open: default_max_played_items(),
            initial_volume: default_initial_volume(),
            event_buffer: default_event_buffer(),
            device_resolver_thread: default_device_resolver_thread(),
            call_timeout_ms: default_call_timeout_ms(),
            max_queue_items: default_max_queue_items(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from an optional TOML file and the environment
    ///
    /// Environment variables use the `LYRA_` prefix, e.g.
    /// `LYRA_EVENT_BUFFER=128`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path).required(true));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("LYRA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(ConfigError::Invalid(format!(
                "initial_volume must be within 0.0..=1.0, got {}",
                self.initial_volume
            )));
        }

        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "event_buffer must be at least 1".to_string(),
            ));
        }

        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "call_timeout_ms must be positive".to_string(),
            ));
        }

        if self.max_queue_items == 0 {
            return Err(ConfigError::Invalid(
                "max_queue_items must be at least 1".to_string(),
            ));
        }

        if self.device_resolver_thread.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "device_resolver_thread must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

// Default values
fn default_max_played_items() -> u32 {
    2
}

fn default_initial_volume() -> f32 {
    1.0
}

fn default_event_buffer() -> usize {
    64
}

fn default_device_resolver_thread() -> String {
    "lyra-device-resolver".to_string()
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_max_queue_items() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = PlayerConfig::default();
        assert_eq!(config.max_played_items_to_keep_open, 2);
        assert_eq!(config.event_buffer, 64);
        assert_eq!(config.call_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_queue_items, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_overrides_defaults() {
        let file = toml_file("event_buffer = 8\ninitial_volume = 0.5\n");
        let config = PlayerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.event_buffer, 8);
        assert_eq!(config.initial_volume, 0.5);
        assert_eq!(config.max_played_items_to_keep_open, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file = toml_file("initial_volume = 1.5\n");
        assert!(matches!(
            PlayerConfig::load(Some(file.path())),
            Err(ConfigError::Invalid(_))
        ));

        let config = PlayerConfig {
            event_buffer: 0,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            max_queue_items: 0,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            PlayerConfig::load(Some(&path)),
            Err(ConfigError::Load(_))
        ));
    }
}
