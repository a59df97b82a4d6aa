//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or empty required input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stored bytes could not be decoded
    #[error("Corrupt record {key}: {reason}")]
    CorruptRecord {
        /// Key of the offending record
        key: String,
        /// Decoder message
        reason: String,
    },

    /// Storage error (RocksDB, PostgreSQL, transaction failure)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The storage namespace could not be initialized
    #[error("Startup error: {0}")]
    Startup(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error was caused by caller input rather than the store
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
