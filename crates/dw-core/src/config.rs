use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const MAX_BATCH_SIZE: usize = 2000;
pub const DEFAULT_FLUSH_MS: u64 = 50;
pub const MAX_FLUSH_MS: u64 = 5000;
pub const QUEUE_FACTOR: usize = 8;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse config: {message}")]
    Parse { message: String },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Batching knobs after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub enabled: bool,
    pub size: usize,
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_MS),
        }
    }
}

impl BatchConfig {
    pub fn new(enabled: bool, size: usize, flush_ms: u64) -> Self {
        let size = if size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            size.min(MAX_BATCH_SIZE)
        };
        let flush_ms = if flush_ms == 0 {
            DEFAULT_FLUSH_MS
        } else {
            flush_ms.min(MAX_FLUSH_MS)
        };
        Self {
            enabled,
            size,
            flush_interval: Duration::from_millis(flush_ms),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.size * QUEUE_FACTOR
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub batch_enabled: bool,
    pub batch_size: usize,
    pub batch_flush_ms: u64,
    pub max_body_bytes: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_flush_ms: DEFAULT_FLUSH_MS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: String,
    pub bind: IpAddr,
    pub port: u16,
    pub ingestor_token: Option<String>,
    pub ingest: IngestSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: ".deliverywatch/events.db".to_string(),
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 4830,
            ingestor_token: None,
            ingest: IngestSettings::default(),
        }
    }
}

impl Config {
    /// Reads the TOML file when given (a missing file means defaults), then
    /// applies `DW_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    message: err.to_string(),
                });
            }
        };
        toml::from_str(&content).map_err(|err| ConfigError::Parse {
            message: err.to_string(),
        })
    }

    pub fn apply_env<L>(&mut self, lookup: L) -> Result<(), ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get("DW_DB_PATH") {
            self.db_path = value;
        }
        if let Some(value) = get("DW_BIND") {
            self.bind = parse_value("DW_BIND", &value)?;
        }
        if let Some(value) = get("DW_PORT") {
            self.port = parse_value("DW_PORT", &value)?;
        }
        if let Some(value) = get("DW_INGESTOR_TOKEN") {
            self.ingestor_token = Some(value);
        }
        if let Some(value) = get("DW_INGEST_BATCH_ENABLED") {
            self.ingest.batch_enabled = parse_bool("DW_INGEST_BATCH_ENABLED", &value)?;
        }
        if let Some(value) = get("DW_INGEST_BATCH_SIZE") {
            self.ingest.batch_size = parse_value("DW_INGEST_BATCH_SIZE", &value)?;
        }
        if let Some(value) = get("DW_INGEST_BATCH_FLUSH_MS") {
            self.ingest.batch_flush_ms = parse_value("DW_INGEST_BATCH_FLUSH_MS", &value)?;
        }
        if let Some(value) = get("DW_MAX_BODY_BYTES") {
            self.ingest.max_body_bytes = parse_value("DW_MAX_BODY_BYTES", &value)?;
        }
        Ok(())
    }

    pub fn batch(&self) -> BatchConfig {
        BatchConfig::new(
            self.ingest.batch_enabled,
            self.ingest.batch_size,
            self.ingest.batch_flush_ms,
        )
    }

    pub fn max_body_bytes(&self) -> usize {
        if self.ingest.max_body_bytes == 0 {
            DEFAULT_MAX_BODY_BYTES
        } else {
            self.ingest.max_body_bytes
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
