//! Record codec
//!
//! Records are stored as self-describing JSON so that the store can be
//! inspected with ordinary tools and new fields can be added with defaults.

use crate::{
    error::{Error, Result},
    types::UserRecord,
};

/// Encode a record for storage
pub fn encode(record: &UserRecord) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode a stored record
///
/// `key` is only used to name the record in the error.
pub fn decode(key: &str, bytes: &[u8]) -> Result<UserRecord> {
    serde_json::from_slice(bytes).map_err(|e| Error::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decode stored bytes, or start a zeroed record when the key is absent
pub fn decode_or_new(key: &str, bytes: Option<&[u8]>) -> Result<UserRecord> {
    match bytes {
        Some(bytes) if !bytes.is_empty() => decode(key, bytes),
        _ => Ok(UserRecord::new(key)),
    }
}
