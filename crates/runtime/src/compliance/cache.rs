//! Query Cache: fingerprint → report, one JSON file per entry, TTL
//! eviction on read. Ported from the prototype's `utils/cache.py`.

use crate::compliance::errors::{ComplianceResult, StorageError};
use crate::compliance::types::{CacheEntry, CacheSummary, QueryFingerprint};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Text the UI appends when forwarding user-supplied clarification;
/// must be stripped before cache-keying (spec.md §4.5, GLOSSARY).
const CLARIFICATION_APPENDIX_MARKER: &str = "\n\n【clarification appendix】";
const CLARIFICATION_APPENDIX_MARKER_ZH: &str = "\n\n【用戶補充說明】";

/// Strips either clarification-appendix marker, returning the text the
/// fingerprint must be computed over.
pub fn strip_clarification_appendix(query: &str) -> &str {
    for marker in [CLARIFICATION_APPENDIX_MARKER, CLARIFICATION_APPENDIX_MARKER_ZH] {
        if let Some(idx) = query.find(marker) {
            return &query[..idx];
        }
    }
    query
}

/// sha256(`"{query}|{jurisdiction}"`) truncated to 16 hex chars, ported
/// verbatim from `utils/cache.py: _make_key`.
pub fn fingerprint(query: &str, jurisdiction: Option<&str>) -> QueryFingerprint {
    let cache_key_query = strip_clarification_appendix(query);
    let material = format!("{}|{}", cache_key_query, jurisdiction.unwrap_or(""));
    let digest = Sha256::digest(material.as_bytes());
    QueryFingerprint(hex::encode(digest)[..16].to_string())
}

pub struct QueryCache {
    dir: PathBuf,
    ttl: chrono::Duration,
}

impl QueryCache {
    pub fn new(dir: PathBuf, ttl_hours: i64) -> Self {
        Self {
            dir,
            ttl: chrono::Duration::hours(ttl_hours),
        }
    }

    fn entry_path(&self, fp: &QueryFingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fp.0))
    }

    /// Returns the stored result if present and fresh; evicts (deletes
    /// the file) and returns `None` if stale.
    pub async fn get(
        &self,
        query: &str,
        jurisdiction: Option<&str>,
    ) -> ComplianceResult<Option<CacheEntry>> {
        let fp = fingerprint(query, jurisdiction);
        let path = self.entry_path(&fp);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await.map_err(StorageError::from)?;
        let entry: CacheEntry = serde_json::from_slice(&bytes).map_err(StorageError::from)?;

        if Utc::now() - entry.stored_at > self.ttl {
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    pub async fn set(
        &self,
        query: &str,
        jurisdiction: Option<&str>,
        result: serde_json::Value,
    ) -> ComplianceResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(StorageError::from)?;
        let fp = fingerprint(query, jurisdiction);
        let entry = CacheEntry {
            stored_at: Utc::now(),
            query: query.to_string(),
            jurisdiction: jurisdiction.map(str::to_string),
            result,
        };
        let bytes = serde_json::to_vec_pretty(&entry).map_err(StorageError::from)?;
        tokio::fs::write(self.entry_path(&fp), bytes)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Summaries sorted newest-first. Expired/corrupt entries are
    /// evicted as they're encountered.
    pub async fn list(&self) -> ComplianceResult<Vec<CacheSummary>> {
        let mut summaries = Vec::new();
        let Ok(mut read_dir) = tokio::fs::read_dir(&self.dir).await else {
            return Ok(summaries);
        };
        while let Some(entry) = read_dir.next_entry().await.map_err(StorageError::from)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = tokio::fs::read(&path).await else {
                continue;
            };
            let Ok(parsed) = serde_json::from_slice::<CacheEntry>(&bytes) else {
                let _ = tokio::fs::remove_file(&path).await;
                continue;
            };
            if Utc::now() - parsed.stored_at > self.ttl {
                let _ = tokio::fs::remove_file(&path).await;
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            summaries.push(CacheSummary {
                id,
                query: parsed.query,
                jurisdiction: parsed.jurisdiction,
                stored_at: parsed.stored_at,
                age_minutes: (Utc::now() - parsed.stored_at).num_minutes(),
            });
        }
        summaries.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        Ok(summaries)
    }

    pub async fn clear_all(&self) -> ComplianceResult<usize> {
        let mut removed = 0;
        let Ok(mut read_dir) = tokio::fs::read_dir(&self.dir).await else {
            return Ok(0);
        };
        while let Some(entry) = read_dir.next_entry().await.map_err(StorageError::from)? {
            if tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Total entry count, total bytes, oldest/newest timestamps. Not
    /// named in spec.md but implied by admin tooling around the cache
    /// (ported from `utils/cache.py: get_stats`).
    pub async fn stats(&self) -> ComplianceResult<CacheStats> {
        let mut stats = CacheStats::default();
        let Ok(mut read_dir) = tokio::fs::read_dir(&self.dir).await else {
            return Ok(stats);
        };
        while let Some(entry) = read_dir.next_entry().await.map_err(StorageError::from)? {
            let path = entry.path();
            let Ok(meta) = tokio::fs::metadata(&path).await else {
                continue;
            };
            stats.total_count += 1;
            stats.total_bytes += meta.len();
            if let Ok(bytes) = tokio::fs::read(&path).await {
                if let Ok(parsed) = serde_json::from_slice::<CacheEntry>(&bytes) {
                    stats.oldest = Some(stats.oldest.map_or(parsed.stored_at, |o| o.min(parsed.stored_at)));
                    stats.newest = Some(stats.newest.map_or(parsed.stored_at, |n| n.max(parsed.stored_at)));
                }
            }
        }
        Ok(stats)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub total_count: usize,
    pub total_bytes: u64,
    pub oldest: Option<chrono::DateTime<Utc>>,
    pub newest: Option<chrono::DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_zh_clarification_appendix() {
        let q = "台灣個資法\n\n【用戶補充說明】\n醫療業";
        assert_eq!(strip_clarification_appendix(q), "台灣個資法");
    }

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let a = fingerprint("query", Some("TW"));
        let b = fingerprint("query", Some("TW"));
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 16);
    }

    #[test]
    fn fingerprint_collapses_clarification_variants() {
        let a = fingerprint("台灣個資法", Some("TW"));
        let b = fingerprint("台灣個資法\n\n【用戶補充說明】\n醫療業", Some("TW"));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn set_then_get_returns_same_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = QueryCache::new(tmp.path().to_path_buf(), 24);
        cache
            .set("query", Some("TW"), json!({"ok": true}))
            .await
            .unwrap();
        let entry = cache.get("query", Some("TW")).await.unwrap().unwrap();
        assert_eq!(entry.result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_on_read() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = QueryCache::new(tmp.path().to_path_buf(), 0);
        cache.set("q", None, json!({"x": 1})).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let result = cache.get("q", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn clear_all_removes_every_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = QueryCache::new(tmp.path().to_path_buf(), 24);
        cache.set("a", None, json!({})).await.unwrap();
        cache.set("b", None, json!({})).await.unwrap();
        let removed = cache.clear_all().await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.list().await.unwrap().is_empty());
    }
}
