//! Configuration for the receiving end.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use diode_core::RedisEndpoint;
use diode_core::receiver::ReceiverConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where to listen for diode traffic.
    pub network: NetworkConfig,
    /// Sink queue settings.
    pub queue: QueueConfig,
    /// Reassembly and dedup bounds.
    pub limits: LimitsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IP to bind the listening UDP socket to.
    pub bind_ip: String,
    /// UDP port to listen on.
    pub bind_port: u16,
}

/// Redis sink-queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
    /// Queue completed messages are pushed to.
    pub sink_queue: String,
}

/// Bounds for the receiver's state tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Live reassembly slots tolerated before housekeeping.
    pub slot_soft_limit: usize,
    /// Seconds a partial assembly may sit idle. Tune to roughly twice
    /// the time one full redundant pass takes to send.
    pub slot_ttl_secs: u64,
    /// Dedup entries tolerated before housekeeping.
    pub dedup_soft_limit: usize,
    /// Seconds a delivery record is remembered. Must cover the span
    /// over which all redundant copies of a message can arrive.
    pub dedup_ttl_secs: u64,
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
            bind_ip: "0.0.0.0".into(),
            bind_port: 8888,
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
            sink_queue: "diode_in".into(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            slot_soft_limit: 20,
            slot_ttl_secs: 30,
            dedup_soft_limit: 1000,
            dedup_ttl_secs: 3600,
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

    /// Redis endpoint for the sink queue.
    pub fn redis_endpoint(&self) -> RedisEndpoint {
        RedisEndpoint {
            host: self.queue.host.clone(),
            port: self.queue.port,
            password: self.queue.password.clone(),
            db: self.queue.db,
        }
    }

    /// Convert limit settings into the pipeline configuration.
    pub fn to_pipeline_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            sink_queue: self.queue.sink_queue.clone(),
            slot_soft_limit: self.limits.slot_soft_limit.max(1),
            slot_ttl: Duration::from_secs(self.limits.slot_ttl_secs.max(1)),
            dedup_soft_limit: self.limits.dedup_soft_limit.max(1),
            dedup_ttl: Duration::from_secs(self.limits.dedup_ttl_secs.max(1)),
        }
    }

    /// The socket address to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.network.bind_ip, self.network.bind_port)
    }
}

// ── Tests ────────────────────────────────────────────────────────
