//! History Store: bounded, persistent, newest-first list of completed
//! queries, ported from `utils/history.py`.

use crate::compliance::cache::strip_clarification_appendix;
use crate::compliance::errors::{ComplianceResult, StorageError};
use crate::compliance::types::{HistoryEntry, HistorySummary};
use chrono::Utc;
use rand::Rng;
use std::path::PathBuf;
use tokio::sync::Mutex;

const DEFAULT_MAX_ITEMS: usize = 50;
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

pub struct HistoryStore {
    path: PathBuf,
    max_items: usize,
    /// File writes are read-modify-write; serialize them so concurrent
    /// `add` calls can't clobber each other.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self::with_max_items(path, DEFAULT_MAX_ITEMS)
    }

    pub fn with_max_items(path: PathBuf, max_items: usize) -> Self {
        Self {
            path,
            max_items,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> ComplianceResult<Vec<HistoryEntry>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let bytes = tokio::fs::read(&self.path).await.map_err(StorageError::from)?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes)
            .map_err(StorageError::from)
            .map_err(Into::into)
    }

    async fn write_all(&self, entries: &[HistoryEntry]) -> ComplianceResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StorageError::from)?;
        }
        let bytes = serde_json::to_vec_pretty(entries).map_err(StorageError::from)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Prepends a new entry with an 8-char random id, truncating to
    /// `max_items` (oldest dropped). `full_query` may carry the
    /// clarification appendix; `original_query` never does.
    pub async fn add(&self, full_query: &str, result: serde_json::Value) -> ComplianceResult<HistoryEntry> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_all().await?;

        let entry = HistoryEntry {
            id: random_id(),
            timestamp: Utc::now(),
            original_query: strip_clarification_appendix(full_query).to_string(),
            full_query: full_query.to_string(),
            result,
        };
        entries.insert(0, entry.clone());
        entries.truncate(self.max_items);
        self.write_all(&entries).await?;
        Ok(entry)
    }

    pub async fn list(&self) -> ComplianceResult<Vec<HistorySummary>> {
        let entries = self.read_all().await?;
        Ok(entries
            .into_iter()
            .map(|e| {
                let trimmed_query: String = e.original_query.chars().take(40).collect();
                let regulation_count = e
                    .result
                    .get("regulations")
                    .and_then(|r| r.get("verified_regulations"))
                    .and_then(|v| v.as_array())
                    .map(Vec::len)
                    .unwrap_or(0);
                HistorySummary {
                    id: e.id,
                    query: trimmed_query,
                    age_minutes: (Utc::now() - e.timestamp).num_minutes(),
                    regulation_count,
                }
            })
            .collect())
    }

    pub async fn get(&self, id: &str) -> ComplianceResult<Option<HistoryEntry>> {
        let entries = self.read_all().await?;
        Ok(entries.into_iter().find(|e| e.id == id))
    }

    pub async fn delete(&self, id: &str) -> ComplianceResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_all().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            self.write_all(&entries).await?;
        }
        Ok(removed)
    }

    pub async fn clear_all(&self) -> ComplianceResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_all(&[]).await
    }
}
