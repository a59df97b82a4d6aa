//! Storage backend using RocksDB

use super::{Storage, Transaction, WriteSet, NAMESPACE};
use crate::{
    config::RocksDBConfig,
    error::{Error, Result},
};
use async_trait::async_trait;
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Embedded RocksDB store
pub struct RocksStorage {
    db: Arc<DB>,

    /// Held by the open transaction
    write_lock: Mutex<()>,

    path: PathBuf,
}

impl fmt::Debug for RocksStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksStorage")
            .field("path", &self.path)
            .finish()
    }
}

impl RocksStorage {
    /// Open or create the database and its namespace
    pub fn open(path: impl AsRef<Path>, config: &RocksDBConfig) -> Result<Self> {
        let path = path.as_ref();

        std::fs::create_dir_all(path)
            .map_err(|e| Error::Startup(format!("cannot create {}: {}", path.display(), e)))?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.max_background_jobs);

        if config.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            NAMESPACE,
            Self::cf_options_records(),
        )];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)
            .map_err(|e| Error::Startup(format!("cannot open RocksDB at {}: {}", path.display(), e)))?;

        if db.cf_handle(NAMESPACE).is_none() {
            return Err(Error::Startup(format!(
                "column family {} missing after open",
                NAMESPACE
            )));
        }

        tracing::info!(path = %path.display(), "Opened RocksDB");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
            path: path.to_path_buf(),
        })
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Records are small and read on every request, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf(&self) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(NAMESPACE)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", NAMESPACE)))
    }

    fn get_sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf()?;
        Ok(self.db.get_cf(&cf, key.as_bytes())?)
    }

    /// Write every entry of `writes` in one atomic batch
    fn write_batch_sync(&self, writes: &WriteSet) -> Result<()> {
        let cf = self.cf()?;

        let mut batch = WriteBatch::default();
        for (key, value) in writes {
            batch.put_cf(&cf, key.as_bytes(), value);
        }
        self.db.write(batch)?;

        tracing::trace!(keys = writes.len(), "Batch committed");
        Ok(())
    }

    fn scan_sync(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let cf = self.cf()?;
        let snapshot = self.db.snapshot();

        let mut entries = Vec::new();
        for item in snapshot.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            entries.push((String::from_utf8_lossy(&key).into_owned(), value.into_vec()));
        }
        Ok(entries)
    }
}

#[async_trait]
impl Storage for RocksStorage {
    fn backend(&self) -> &'static str {
        "rocksdb"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_sync(key)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_batch_sync(&WriteSet::from([(key.to_string(), value.to_vec())]))
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>> {
        let guard = self.write_lock.lock().await;
        Ok(Box::new(RocksTransaction {
            storage: self,
            guard: Some(guard),
            writes: WriteSet::new(),
        }))
    }

    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.scan_sync()
    }
}

/// Writes are buffered and land in a single `WriteBatch` on commit
struct RocksTransaction<'a> {
    storage: &'a RocksStorage,
    guard: Option<MutexGuard<'a, ()>>,
    writes: WriteSet,
}

#[async_trait]
impl<'a> Transaction for RocksTransaction<'a> {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.storage.get_sync(key),
        }
    }

    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.writes.insert(key.to_string(), value);
    }

    async fn commit(&mut self) -> Result<()> {
        if self.guard.is_none() {
            return Err(Error::Storage("transaction already committed".to_string()));
        }

        if !self.writes.is_empty() {
            self.storage.write_batch_sync(&self.writes)?;
        }
        self.writes.clear();
        self.guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (RocksStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = RocksStorage::open(temp_dir.path(), &RocksDBConfig::default()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_storage_open() {
        let (storage, _temp) = test_storage();
        assert!(storage.db.cf_handle(NAMESPACE).is_some());
    }

    #[tokio::test]
    async fn test_reopen_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = RocksStorage::open(temp_dir.path(), &RocksDBConfig::default()).unwrap();
            storage.put("u1", b"one").await.unwrap();
        }

        let storage = RocksStorage::open(temp_dir.path(), &RocksDBConfig::default()).unwrap();
        let value = storage.get_sync("u1").unwrap();
        assert_eq!(value.as_deref(), Some(&b"one"[..]));
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (storage, _temp) = test_storage();

        assert!(storage.get("u1").await.unwrap().is_none());
        storage.put("u1", b"hello").await.unwrap();
        assert_eq!(storage.get("u1").await.unwrap().unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_transaction_reads_current_and_own_writes() {
        let (storage, _temp) = test_storage();
        storage.put("k", b"1").await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        assert_eq!(tx.get("k").await.unwrap().unwrap(), b"1");
        tx.put("k", b"2".to_vec());
        assert_eq!(tx.get("k").await.unwrap().unwrap(), b"2");

        // Readers still see the committed value
        assert_eq!(storage.get("k").await.unwrap().unwrap(), b"1");

        tx.commit().await.unwrap();
        drop(tx);
        assert_eq!(storage.get("k").await.unwrap().unwrap(), b"2");
    }

    #[tokio::test]
    async fn test_multi_key_commit_is_all_or_nothing() {
        let (storage, _temp) = test_storage();
        storage.put("a", b"10").await.unwrap();

        {
            let mut tx = storage.begin().await.unwrap();
            tx.put("a", b"7".to_vec());
            tx.put("b", b"3".to_vec());
            // dropped without commit
        }
        assert_eq!(storage.get("a").await.unwrap().unwrap(), b"10");
        assert!(storage.get("b").await.unwrap().is_none());

        let mut tx = storage.begin().await.unwrap();
        tx.put("a", b"7".to_vec());
        tx.put("b", b"3".to_vec());
        tx.commit().await.unwrap();
        drop(tx);

        assert_eq!(storage.get("a").await.unwrap().unwrap(), b"7");
        assert_eq!(storage.get("b").await.unwrap().unwrap(), b"3");
    }

    #[tokio::test]
    async fn test_transactions_are_serialized() {
        let (storage, _temp) = test_storage();
        let storage = Arc::new(storage);

        let first = storage.begin().await.unwrap();

        let waiter = {
            let storage = storage.clone();
            tokio::spawn(async move {
                let mut tx = storage.begin().await.unwrap();
                tx.put("k", b"second".to_vec());
                tx.commit().await.unwrap();
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_scan_returns_all_records() {
        let (storage, _temp) = test_storage();
        for key in ["a", "b", "c"] {
            storage.put(key, key.as_bytes()).await.unwrap();
        }

        let mut entries = storage.scan().await.unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), b"a".to_vec()),
                ("b".to_string(), b"b".to_vec()),
                ("c".to_string(), b"c".to_vec()),
            ]
        );
    }
}
