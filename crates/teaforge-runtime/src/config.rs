//! Platform configuration, read from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```toml
//! cycle_period_ms = 20
//! can_probe_timeout_ms = 100
//! websocket_connect_timeout_ms = 2000
//! websocket_close_timeout_ms = 500
//! song_dir = "/tmp/teaforge-songs"
//! network_worker_threads = 1
//!
//! [logging]
//! filter = "info,teaforge_kernel=debug"
//! format = "json"
//! otlp_endpoint = "http://10.0.0.5:4318"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use teaforge_kernel::PlatformSettings;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },
}

/// Log output flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info,teaforge_kernel=debug"`.
    #[serde(default = "default_filter")]
    pub filter: String,

    #[serde(default)]
    pub format: LogFormat,

    /// OTLP/HTTP collector base URL. Span export is off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp_endpoint: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
            otlp_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Target length of one program cycle.
    #[serde(default = "default_cycle_period_ms")]
    pub cycle_period_ms: u64,

    #[serde(default = "default_can_probe_timeout_ms")]
    pub can_probe_timeout_ms: u64,

    #[serde(default = "default_websocket_connect_timeout_ms")]
    pub websocket_connect_timeout_ms: u64,

    #[serde(default = "default_websocket_close_timeout_ms")]
    pub websocket_close_timeout_ms: u64,

    /// Where uploaded songs are written before the orchestra loads them.
    #[serde(default = "default_song_dir")]
    pub song_dir: PathBuf,

    /// Worker threads of the runtime that carries websocket and forwarding
    /// traffic.
    #[serde(default = "default_network_worker_threads")]
    pub network_worker_threads: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_filter() -> String {
    "info".to_string()
}
fn default_cycle_period_ms() -> u64 {
    20
}
fn default_can_probe_timeout_ms() -> u64 {
    100
}
fn default_websocket_connect_timeout_ms() -> u64 {
    2000
}
fn default_websocket_close_timeout_ms() -> u64 {
    500
}
fn default_song_dir() -> PathBuf {
    std::env::temp_dir().join("teaforge-songs")
}
fn default_network_worker_threads() -> usize {
    1
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: default_cycle_period_ms(),
            can_probe_timeout_ms: default_can_probe_timeout_ms(),
            websocket_connect_timeout_ms: default_websocket_connect_timeout_ms(),
            websocket_close_timeout_ms: default_websocket_close_timeout_ms(),
            song_dir: default_song_dir(),
            network_worker_threads: default_network_worker_threads(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PlatformConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: PlatformConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config at `path`, falling back to defaults when the file
    /// does not exist. `TEAFORGE_*` environment overrides are applied on top.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => PlatformConfig::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, normally the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `TEAFORGE_LOG` | `logging.filter` |
    /// | `TEAFORGE_LOG_FORMAT` | `logging.format` (`compact` or `json`) |
    /// | `OTEL_EXPORTER_OTLP_ENDPOINT` | `logging.otlp_endpoint` |
    /// | `TEAFORGE_CYCLE_PERIOD_MS` | `cycle_period_ms` |
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(filter) = lookup("TEAFORGE_LOG") {
            self.logging.filter = filter;
        }
        match lookup("TEAFORGE_LOG_FORMAT").as_deref() {
            Some("json") => self.logging.format = LogFormat::Json,
            Some("compact") => self.logging.format = LogFormat::Compact,
            _ => {}
        }
        if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.logging.otlp_endpoint = Some(endpoint);
        }
        if let Some(period) = lookup("TEAFORGE_CYCLE_PERIOD_MS").and_then(|v| v.parse().ok()) {
            self.cycle_period_ms = period;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("cycle_period_ms", self.cycle_period_ms),
            ("can_probe_timeout_ms", self.can_probe_timeout_ms),
            ("websocket_connect_timeout_ms", self.websocket_connect_timeout_ms),
            ("websocket_close_timeout_ms", self.websocket_close_timeout_ms),
            ("network_worker_threads", self.network_worker_threads as u64),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::Zero { field: *field }),
            None => Ok(()),
        }
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_millis(self.cycle_period_ms)
    }

    /// The interpreter's view of this config.
    pub fn settings(&self) -> PlatformSettings {
        PlatformSettings {
            can_probe_timeout: Duration::from_millis(self.can_probe_timeout_ms),
            websocket_connect_timeout: Duration::from_millis(self.websocket_connect_timeout_ms),
            websocket_close_timeout: Duration::from_millis(self.websocket_close_timeout_ms),
            song_dir: self.song_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PlatformConfig::from_toml("").unwrap();
        assert_eq!(config, PlatformConfig::default());
        assert_eq!(config.cycle_period(), Duration::from_millis(20));
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.settings(), PlatformSettings::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = PlatformConfig::from_toml(
            r#"
            cycle_period_ms = 10
            song_dir = "/home/lvuser/songs"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.cycle_period_ms, 10);
        assert_eq!(config.websocket_close_timeout_ms, 500);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(
            config.settings().song_dir,
            PathBuf::from("/home/lvuser/songs")
        );
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = PlatformConfig::from_toml("cycle_period_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Zero { field: "cycle_period_ms" }));
        let err = PlatformConfig::from_toml("network_worker_threads = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Zero { field: "network_worker_threads" }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = PlatformConfig::from_toml("cycle_period_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlatformConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.can_probe_timeout_ms, 100);
    }

    #[test]
    fn load_from_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teaforge.toml");
        std::fs::write(&path, "websocket_connect_timeout_ms = 750\n").unwrap();
        let config = PlatformConfig::load_from(&path).unwrap();
        assert_eq!(config.websocket_connect_timeout_ms, 750);
        assert_eq!(
            config.settings().websocket_connect_timeout,
            Duration::from_millis(750)
        );
    }

    #[test]
    fn overrides_replace_logging_and_period() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TEAFORGE_LOG", "debug"),
            ("TEAFORGE_LOG_FORMAT", "json"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4318"),
            ("TEAFORGE_CYCLE_PERIOD_MS", "5"),
        ]);
        let mut config = PlatformConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.logging.otlp_endpoint.as_deref(),
            Some("http://localhost:4318")
        );
        assert_eq!(config.cycle_period_ms, 5);
    }

    #[test]
    fn unparsable_override_is_ignored() {
        let mut config = PlatformConfig::default();
        config.apply_overrides(|key| (key == "TEAFORGE_CYCLE_PERIOD_MS").then(|| "soon".into()));
        assert_eq!(config.cycle_period_ms, 20);
    }
}
