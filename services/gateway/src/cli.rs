//! Command-line interface for the gateway binary.

use std::path::PathBuf;

use clap::Parser;
use hourlymotion_ledger::{config::Backend, Config};

/// Hourlymotion gateway arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "hourlymotion", version, about = "Ad-for-tokens engagement ledger")]
pub struct Args {
    /// Listen address for the HTTP server [default: 0.0.0.0:8080]
    #[arg(long)]
    pub addr: Option<String>,

    /// Path of the local database storage [default: hourlymotion.db]
    #[arg(long = "db-path")]
    pub db_path: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Storage backend (rocksdb, postgres, memory)
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Log output format (text or json)
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Args {
    /// Resolve the effective configuration.
    ///
    /// Precedence, lowest first: built-in defaults, the config file,
    /// environment variables, command-line flags.
    pub fn load_config(&self) -> hourlymotion_ledger::Result<Config> {
        let config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        let mut config = config.with_env()?;

        if let Some(addr) = &self.addr {
            config.listen_addr = addr.clone();
        }
        if let Some(path) = &self.db_path {
            config.db_path = path.clone();
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
