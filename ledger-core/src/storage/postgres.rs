//! PostgreSQL storage backend.
//!
//! Records live in a single two-column table. Transactions lock the table in
//! `SHARE ROW EXCLUSIVE` mode, which conflicts with itself but not with plain
//! `SELECT`s, so writers run one at a time while listings keep reading the
//! last committed state.

use super::{Storage, Transaction, WriteSet, NAMESPACE};
use crate::error::{Error, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use std::time::Duration;

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect and create the records table if needed.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| Error::Startup(format!("cannot connect to database: {}", e)))?;

        let storage = Self { pool };
        storage
            .ensure_table()
            .await
            .map_err(|e| Error::Startup(format!("cannot create table {}: {}", NAMESPACE, e)))?;

        tracing::info!(table = NAMESPACE, "Connected to PostgreSQL");
        Ok(storage)
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hourlymotion (
                id TEXT PRIMARY KEY,
                record BYTEA NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Storage for PgStorage {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let record = sqlx::query_scalar::<_, Vec<u8>>(
            r#"
            SELECT record FROM hourlymotion WHERE id = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hourlymotion (id, record)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET record = EXCLUDED.record
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>> {
        let mut tx = self.pool.begin().await?;

        // Conflicts with itself, not with plain reads
        sqlx::query("LOCK TABLE hourlymotion IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgTransaction {
            tx: Some(tx),
            writes: WriteSet::new(),
        }))
    }

    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let rows = sqlx::query_as::<_, (String, Vec<u8>)>(
            r#"
            SELECT id, record FROM hourlymotion
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Open database transaction; dropping it without commit rolls back.
struct PgTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
    writes: WriteSet,
}

impl PgTransaction {
    fn conn(&mut self) -> Result<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| Error::Storage("transaction already committed".to_string()))
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }

        let tx = self.conn()?;
        let record = sqlx::query_scalar::<_, Vec<u8>>(
            r#"
            SELECT record FROM hourlymotion WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(record)
    }

    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.writes.insert(key.to_string(), value);
    }

    async fn commit(&mut self) -> Result<()> {
        let mut tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Storage("transaction already committed".to_string()))?;

        for (key, value) in std::mem::take(&mut self.writes) {
            sqlx::query(
                r#"
                INSERT INTO hourlymotion (id, record)
                VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE SET record = EXCLUDED.record
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

// These require a running database and are marked as ignored.
// Run with: DATABASE_URL=postgres://... cargo test -- --ignored
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_storage() -> PgStorage {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let storage = PgStorage::connect(&url, 5).await.unwrap();
        sqlx::query("TRUNCATE hourlymotion")
            .execute(storage.pool())
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    #[ignore]
    async fn test_pg_transaction_and_scan() {
        let storage = test_storage().await;

        let mut tx = storage.begin().await.unwrap();
        assert!(tx.get("u1").await.unwrap().is_none());
        tx.put("u1", b"{}".to_vec());
        tx.put("u2", b"{}".to_vec());
        assert_eq!(tx.get("u1").await.unwrap().unwrap(), b"{}");
        tx.commit().await.unwrap();
        drop(tx);

        assert_eq!(storage.get("u1").await.unwrap().unwrap(), b"{}");
        assert_eq!(storage.scan().await.unwrap().len(), 2);
    }

    #[tokio::test]
    #[ignore]
    async fn test_pg_dropped_transaction_rolls_back() {
        let storage = test_storage().await;
        storage.put("u1", b"before").await.unwrap();

        {
            let mut tx = storage.begin().await.unwrap();
            tx.put("u1", b"after".to_vec());
            tx.put("u2", b"new".to_vec());
        }

        assert_eq!(storage.get("u1").await.unwrap().unwrap(), b"before");
        assert!(storage.get("u2").await.unwrap().is_none());
    }
}
