//! In-memory storage backend.

use super::{Storage, Transaction, WriteSet};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::{Mutex, MutexGuard};

/// Non-durable store backed by a sorted map.
///
/// Suitable for tests and throwaway runs. Everything is lost when the
/// process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<BTreeMap<String, Vec<u8>>>,

    /// Held by the open transaction
    write_lock: Mutex<()>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn apply(&self, writes: WriteSet) {
        let mut records = self.records.write();
        records.extend(writes);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.apply(WriteSet::from([(key.to_string(), value.to_vec())]));
        Ok(())
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>> {
        let guard = self.write_lock.lock().await;
        Ok(Box::new(MemoryTransaction {
            storage: self,
            guard: Some(guard),
            writes: WriteSet::new(),
        }))
    }

    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .records
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

struct MemoryTransaction<'a> {
    storage: &'a MemoryStorage,
    guard: Option<MutexGuard<'a, ()>>,
    writes: WriteSet,
}

#[async_trait]
impl<'a> Transaction for MemoryTransaction<'a> {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }
        self.storage.get(key).await
    }

    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.writes.insert(key.to_string(), value);
    }

    async fn commit(&mut self) -> Result<()> {
        if self.guard.is_none() {
            return Err(Error::Storage("transaction already committed".to_string()));
        }

        self.storage.apply(std::mem::take(&mut self.writes));
        self.guard = None;
        Ok(())
    }
}
