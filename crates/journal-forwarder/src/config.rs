// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::constants::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::record::Priority;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Forwarder configuration, read from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// URL of the ingestion endpoint
    pub endpoint: String,
    /// Destination log group
    pub log_group: String,
    /// Destination log stream; falls back to `instance_id`
    pub log_stream: Option<String>,
    /// Identifier of this host, attached to every record
    pub instance_id: Option<String>,
    /// Path of the checkpoint file
    pub state_file: PathBuf,
    /// Journal directory to read instead of the system journal
    pub journal_dir: Option<PathBuf>,
    /// Least severe priority forwarded
    #[serde(deserialize_with = "deserialize_priority")]
    pub log_priority: Priority,
    /// Comma separated unit names to forward
    pub log_unit: String,
    /// Records per batch
    pub buffer_size: usize,
    /// Sent as `X-Api-Key` when set
    pub api_key: Option<String>,
    /// Forwarder's own log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            log_group: String::new(),
            log_stream: None,
            instance_id: None,
            state_file: PathBuf::new(),
            journal_dir: None,
            log_priority: Priority::Debug,
            log_unit: String::new(),
            buffer_size: DEFAULT_BATCH_SIZE,
            api_key: None,
            log_level: "info".to_string(),
        }
    }
}

fn deserialize_priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Priority, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The stream events are written to.
    #[must_use]
    pub fn log_stream(&self) -> Option<&str> {
        non_blank(self.log_stream.as_ref()).or_else(|| non_blank(self.instance_id.as_ref()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint cannot be empty".to_string()));
        }
        if self.log_group.trim().is_empty() {
            return Err(ConfigError::Invalid("log_group cannot be empty".to_string()));
        }
        if self.log_stream().is_none() {
            return Err(ConfigError::Invalid(
                "log_stream is required when instance_id is not set".to_string(),
            ));
        }
        if self.state_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("state_file cannot be empty".to_string()));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.buffer_size) {
            return Err(ConfigError::Invalid(format!(
                "buffer_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.buffer_size
            )));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> Config {
        Config {
            endpoint: "https://logs.example.com/events".to_string(),
            log_group: "hosts".to_string(),
            instance_id: Some("i-0abc".to_string()),
            state_file: PathBuf::from("/var/lib/journald-cloud-forwarder/state"),
            ..Default::default()
        }
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_is_invalid() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            r#"
endpoint = "https://logs.example.com/events"
log_group = "hosts"
log_stream = "web-1"
instance_id = "i-0abc"
state_file = "/tmp/state"
journal_dir = "/var/log/journal"
log_priority = "warning"
log_unit = "sshd,nginx"
buffer_size = 500
api_key = "secret"
log_level = "debug"
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.log_stream(), Some("web-1"));
        assert_eq!(config.log_priority, Priority::Warning);
        assert_eq!(config.log_unit, "sshd,nginx");
        assert_eq!(config.buffer_size, 500);
        assert_eq!(config.journal_dir, Some(PathBuf::from("/var/log/journal")));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_load_applies_defaults() {
        let file = write_config(
            r#"
endpoint = "http://localhost:8080"
log_group = "hosts"
instance_id = "i-0abc"
state_file = "/tmp/state"
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.log_stream(), Some("i-0abc"));
        assert_eq!(config.log_priority, Priority::Debug);
        assert_eq!(config.buffer_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.log_level, "info");
        assert!(config.log_unit.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_rejects_bad_priority_and_unknown_keys() {
        let file = write_config("endpoint = \"x\"\nlog_priority = \"loud\"\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let file = write_config("endpoint = \"x\"\nbatch = 3\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_required_keys() {
        for config in [
            Config {
                endpoint: " ".to_string(),
                ..valid()
            },
            Config {
                log_group: String::new(),
                ..valid()
            },
            Config {
                state_file: PathBuf::new(),
                ..valid()
            },
            Config {
                instance_id: None,
                log_stream: Some("  ".to_string()),
                ..valid()
            },
        ] {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_validate_buffer_size() {
        for buffer_size in [0, MAX_BATCH_SIZE + 1] {
            let config = Config {
                buffer_size,
                ..valid()
            };
            assert!(config.validate().is_err(), "buffer_size {buffer_size}");
        }
        for buffer_size in [1, MAX_BATCH_SIZE] {
            let config = Config {
                buffer_size,
                ..valid()
            };
            assert!(config.validate().is_ok(), "buffer_size {buffer_size}");
        }
    }

    #[test]
    fn test_validate_log_levels() {
        for level in VALID_LOG_LEVELS {
            let config = Config {
                log_level: level.to_string(),
                ..valid()
            };
            assert!(config.validate().is_ok(), "Log level '{level}' should be valid");
        }
        let config = Config {
            log_level: "verbose".to_string(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }
}
