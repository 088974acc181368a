//! Layered Configuration
//!
//! Defaults, then an optional TOML file, then `VOLTA_*` environment
//! variables (`VOLTA_SERVER__BIND_ADDR`, `VOLTA_SAMPLER__SAMPLE_PERIOD_US`, ...).

use crate::{rate_limit::RateLimitConfig, ServerError};
use config::{Config, Environment, File};
use ring_buffer::DEFAULT_CAPACITY;
use sampler::{AccumulatorSettings, SamplerConfig, SourceConfig};
use serde::{Deserialize, Serialize};
use snapshot::MIN_CHUNK_LEN;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "VOLTA";

/// Config file read when no path is given (optional)
pub const DEFAULT_CONFIG_FILE: &str = "volta.toml";

/// Full application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoltaConfig {
    /// Device identity shown on the health endpoint
    pub device_name: String,
    pub server: ServerConfig,
    pub buffer: BufferConfig,
    pub sampler: SamplerConfig,
    pub accumulator: AccumulatorSettings,
    pub source: SourceConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LogConfig,
}

impl Default for VoltaConfig {
    fn default() -> Self {
        Self {
            device_name: "volta".to_string(),
            server: ServerConfig::default(),
            buffer: BufferConfig::default(),
            sampler: SamplerConfig::default(),
            accumulator: AccumulatorSettings::default(),
            source: SourceConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Bytes offered to the snapshot serializer per body chunk
    pub chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            chunk_size: 1024,
        }
    }
}

/// History ring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl VoltaConfig {
    /// Load from defaults, `path` (or [`DEFAULT_CONFIG_FILE`]) and the environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&str>) -> Result<Self, ServerError> {
        let file = path.unwrap_or(DEFAULT_CONFIG_FILE);

        let config: Self = Config::builder()
            .add_source(File::with_name(file).required(path.is_some()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.server.chunk_size < MIN_CHUNK_LEN {
            return Err(ServerError::InvalidConfig(format!(
                "server.chunk_size must be at least {MIN_CHUNK_LEN}, got {}",
                self.server.chunk_size
            )));
        }
        if self.buffer.capacity == 0 {
            return Err(ServerError::InvalidConfig(
                "buffer.capacity must be greater than zero".into(),
            ));
        }
        self.sampler.validate(&self.accumulator)?;
        Ok(())
    }
}
