//! Read-only views over the ledger

use crate::{codec, error::Result, storage::Storage, types::UserRecord};

/// Decode every stored record
///
/// Reads a point-in-time snapshot. Order is whatever the backend iterates
/// in. A single undecodable record fails the whole listing.
pub async fn list_all(storage: &dyn Storage) -> Result<Vec<UserRecord>> {
    storage
        .scan()
        .await?
        .iter()
        .map(|(key, bytes)| codec::decode(key, bytes))
        .collect()
}

/// Fetch one record; `None` when the user was never seen
pub async fn get_user(storage: &dyn Storage, user_id: &str) -> Result<Option<UserRecord>> {
    storage
        .get(user_id)
        .await?
        .map(|bytes| codec::decode(user_id, &bytes))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, storage::MemoryStorage};

    #[tokio::test]
    async fn test_get_unknown_user() {
        let storage = MemoryStorage::new();
        assert!(get_user(&storage, "nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_corrupt_user() {
        let storage = MemoryStorage::new();
        storage.put("u1", b"\x00garbage").await.unwrap();

        let err = get_user(&storage, "u1").await.unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }));
    }

    #[tokio::test]
    async fn test_list_all_fails_on_any_corrupt_record() {
        let storage = MemoryStorage::new();
        let good = codec::encode(&UserRecord::new("a")).unwrap();
        storage.put("a", &good).await.unwrap();
        storage.put("b", b"nope").await.unwrap();

        let err = list_all(&storage).await.unwrap_err();
        match err {
            Error::CorruptRecord { key, .. } => assert_eq!(key, "b"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_all_empty_store() {
        let storage = MemoryStorage::new();
        assert!(list_all(&storage).await.unwrap().is_empty());
    }
}
