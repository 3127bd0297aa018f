//! Configuration for the sending end.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use diode_core::RedisEndpoint;
use diode_core::sender::SenderConfig;

/// Largest chunk size whose encoded frame still fits one datagram.
const MAX_CHUNK_SIZE: usize = 2048;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the receiving end listens.
    pub network: NetworkConfig,
    /// Source queue settings.
    pub queue: QueueConfig,
    /// Transport tuning.
    pub transport: TransportConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Hostname or IP of the diode receiver.
    pub receiver_host: String,
    /// UDP port of the diode receiver.
    pub receiver_port: u16,
    /// Local interface to send from.
    pub bind_interface: String,
}

/// Redis source-queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
    /// Queue the sender drains.
    pub source_queue: String,
}

/// Transport tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum chunk size in bytes.
    pub chunk_size: usize,
    /// Whole-message redundant copies to emit.
    pub redundant_copies: u16,
    /// Microseconds to sleep between datagrams.
    pub pacing_us: u64,
    /// Milliseconds to sleep when the source queue is empty.
    pub idle_sleep_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            receiver_host: "127.0.0.1".into(),
            receiver_port: 8888,
            bind_interface: "0.0.0.0".into(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            password: String::new(),
            db: 0,
            source_queue: "diode_out".into(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            redundant_copies: 2,
            pacing_us: 1000,
            idle_sleep_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Redis endpoint for the source queue.
    pub fn redis_endpoint(&self) -> RedisEndpoint {
        RedisEndpoint {
            host: self.queue.host.clone(),
            port: self.queue.port,
            password: self.queue.password.clone(),
            db: self.queue.db,
        }
    }

    /// Convert transport settings into the pipeline configuration.
    pub fn to_pipeline_config(&self) -> SenderConfig {
        SenderConfig {
            source_queue: self.queue.source_queue.clone(),
            chunk_size: self.transport.chunk_size.clamp(1, MAX_CHUNK_SIZE),
            redundant_copies: self.transport.redundant_copies.max(1),
            pacing: Duration::from_micros(self.transport.pacing_us),
            idle_sleep: Duration::from_millis(self.transport.idle_sleep_ms),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
