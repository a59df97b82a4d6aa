//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RocksDB directory
    pub db_path: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// HTTP listen address
    pub listen_addr: String,

    /// Log output format (`text` or `json`)
    pub log_format: String,

    /// Raw event journal (JSON lines), disabled when unset
    pub event_log_path: Option<PathBuf>,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Ad gating configuration
    pub gating: GatingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("hourlymotion.db"),
            service_name: "hourlymotion".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            log_format: "text".to_string(),
            event_log_path: None,
            storage: StorageConfig::default(),
            gating: GatingConfig::default(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded RocksDB at `db_path`
    RocksDb,
    /// PostgreSQL at `storage.database_url`
    Postgres,
    /// Process memory (not durable)
    Memory,
}

impl FromStr for Backend {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rocksdb" | "rocks" => Ok(Backend::RocksDb),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "memory" => Ok(Backend::Memory),
            other => Err(crate::Error::Config(format!("unknown storage backend: {}", other))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to open
    pub backend: Backend,

    /// PostgreSQL connection URL
    pub database_url: Option<String>,

    /// PostgreSQL pool size
    pub max_connections: u32,

    /// RocksDB tuning
    pub rocksdb: RocksDBConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::RocksDb,
            database_url: None,
            max_connections: 10,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 16,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Gating policy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Skip the ad while any token is left, one token per skip
    SingleToken,
    /// Skip only for opted-in users above a token threshold
    Threshold,
}

impl FromStr for PolicyKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single_token" | "single-token" => Ok(PolicyKind::SingleToken),
            "threshold" => Ok(PolicyKind::Threshold),
            other => Err(crate::Error::Config(format!("unknown gating policy: {}", other))),
        }
    }
}

/// Ad gating configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatingConfig {
    /// Decision rule
    pub policy: PolicyKind,

    /// Threshold policy: balance must exceed this
    pub threshold: i64,

    /// Threshold policy: tokens debited per skipped ad
    pub cost: i64,

    /// Threshold policy: settings key users set to opt in
    pub flag: String,

    /// Never let a decision drive the balance below zero
    pub floor_balance: bool,
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::SingleToken,
            threshold: 4,
            cost: 4,
            flag: crate::types::REDUCE_ADS.to_string(),
            floor_balance: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        Config::default().with_env()
    }

    /// Apply environment overrides on top of this configuration
    pub fn with_env(mut self) -> crate::Result<Self> {
        if let Ok(path) = std::env::var("HOURLYMOTION_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }

        if let Ok(addr) = std::env::var("HOURLYMOTION_ADDR") {
            self.listen_addr = addr;
        }

        if let Ok(backend) = std::env::var("HOURLYMOTION_BACKEND") {
            self.storage.backend = backend.parse()?;
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.storage.database_url = Some(url);
        }

        if let Ok(policy) = std::env::var("HOURLYMOTION_GATING_POLICY") {
            self.gating.policy = policy.parse()?;
        }

        if let Ok(floor) = std::env::var("HOURLYMOTION_FLOOR_BALANCE") {
            self.gating.floor_balance = floor.parse().map_err(|_| {
                crate::Error::Config(format!("HOURLYMOTION_FLOOR_BALANCE is not a bool: {}", floor))
            })?;
        }

        if let Ok(path) = std::env::var("HOURLYMOTION_EVENT_LOG") {
            self.event_log_path = Some(PathBuf::from(path));
        }

        if let Ok(format) = std::env::var("HOURLYMOTION_LOG_FORMAT") {
            self.log_format = format;
        }

        Ok(self)
    }

    /// Check values that cannot be caught by deserialization
    pub fn validate(&self) -> crate::Result<()> {
        if self.listen_addr.is_empty() {
            return Err(crate::Error::Config("listen address cannot be empty".to_string()));
        }

        match self.storage.backend {
            Backend::RocksDb if self.db_path.as_os_str().is_empty() => {
                return Err(crate::Error::Config("db_path is required for rocksdb".to_string()));
            }
            Backend::Postgres if self.storage.database_url.is_none() => {
                return Err(crate::Error::Config(
                    "database_url is required for postgres".to_string(),
                ));
            }
            _ => {}
        }

        if self.gating.cost <= 0 {
            return Err(crate::Error::Config("gating cost must be positive".to_string()));
        }

        if self.gating.threshold < 0 {
            return Err(crate::Error::Config("gating threshold cannot be negative".to_string()));
        }

        if self.gating.policy == PolicyKind::Threshold && self.gating.threshold < self.gating.cost {
            return Err(crate::Error::Config(format!(
                "gating threshold ({}) must be at least the cost ({})",
                self.gating.threshold, self.gating.cost
            )));
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(crate::Error::Config(format!(
                "unknown log format: {}",
                self.log_format
            )));
        }

        Ok(())
    }
}
