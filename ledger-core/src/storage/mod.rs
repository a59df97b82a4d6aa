//! Storage layer
//!
//! One logical namespace mapping user id to encoded record bytes. Backends:
//!
//! - [`RocksStorage`] - embedded RocksDB, column family `hourlymotion` (default)
//! - [`PgStorage`] - PostgreSQL table `hourlymotion` (feature `postgres`)
//! - [`MemoryStorage`] - process memory, lost on exit
//!
//! Every backend serializes transactions globally and commits a transaction's
//! writes all at once; plain reads never wait for the writer and observe
//! committed data only.

use crate::{
    config::{Backend, Config},
    error::{Error, Result},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod rocks;

pub use memory::MemoryStorage;
#[cfg(feature = "postgres")]
pub use postgres::PgStorage;
pub use rocks::RocksStorage;

/// Name of the single namespace (column family / table) holding records
pub const NAMESPACE: &str = "hourlymotion";

/// Writes staged by a transaction, applied together on commit
pub type WriteSet = BTreeMap<String, Vec<u8>>;

/// Transactional key/value persistence
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Backend name, for logs
    fn backend(&self) -> &'static str;

    /// Read the committed value of `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite `key` as a one-write transaction
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Start a read-write transaction over the whole keyspace
    ///
    /// Waits until no other transaction is open, so at most one runs at a
    /// time. Nothing is visible to readers until [`Transaction::commit`];
    /// dropping the transaction discards every staged write.
    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>>;

    /// Every `(key, value)` pair from a consistent point-in-time view
    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>>;
}

/// An open transaction
#[async_trait]
pub trait Transaction: Send {
    /// Read `key`, seeing this transaction's own staged writes
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stage a write of `key`
    fn put(&mut self, key: &str, value: Vec<u8>);

    /// Apply every staged write atomically and release the transaction
    async fn commit(&mut self) -> Result<()>;
}

/// Open the backend selected by configuration
///
/// Ensures the namespace exists; any failure here is a [`Error::Startup`].
pub async fn open(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.storage.backend {
        Backend::RocksDb => Arc::new(RocksStorage::open(&config.db_path, &config.storage.rocksdb)?),
        Backend::Memory => Arc::new(MemoryStorage::new()),
        Backend::Postgres => open_postgres(config).await?,
    };

    tracing::info!(backend = storage.backend(), "Storage ready");
    Ok(storage)
}

#[cfg(feature = "postgres")]
async fn open_postgres(config: &Config) -> Result<Arc<dyn Storage>> {
    let url = config
        .storage
        .database_url
        .as_deref()
        .ok_or_else(|| Error::Startup("postgres backend requires database_url".to_string()))?;
    Ok(Arc::new(
        PgStorage::connect(url, config.storage.max_connections).await?,
    ))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_config: &Config) -> Result<Arc<dyn Storage>> {
    Err(Error::Startup(
        "postgres backend not compiled in (enable the `postgres` feature)".to_string(),
    ))
}
