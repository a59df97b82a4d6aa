//! Raw event journal
//!
//! Optional append-only JSONL file holding every event as received, next to
//! the aggregated ledger. Anonymous events are kept too.

use crate::{
    error::{Error, Result},
    types::Event,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// Receive time
    pub at: DateTime<Utc>,
    /// User id, empty for anonymous viewers
    pub user_id: String,
    /// Event type as sent
    #[serde(rename = "type")]
    pub kind: String,
    /// Video id
    pub video_id: String,
}

impl JournalEntry {
    /// Entry for an event received now
    pub fn from_event(event: &Event) -> Self {
        Self {
            at: Utc::now(),
            user_id: event.user_id().to_string(),
            kind: event.kind.clone(),
            video_id: event.video_id.clone(),
        }
    }
}

/// Append-only JSONL event log
#[derive(Debug)]
pub struct EventJournal {
    path: PathBuf,
    // Serializes appends so lines never interleave
    lock: Mutex<()>,
}

impl EventJournal {
    /// Open (creating if needed) the journal file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        OpenOptions::new().create(true).append(true).open(&path).await?;

        tracing::info!(path = %path.display(), "Event journal enabled");
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Append one event
    pub async fn append(&self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_vec(&JournalEntry::from_event(event))?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every entry back, oldest first
    pub async fn entries(&self) -> Result<Vec<JournalEntry>> {
        let _guard = self.lock.lock().await;
        let content = tokio::fs::read_to_string(&self.path).await?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<JournalEntry>(line).map_err(Error::from))
            .collect()
    }
}
