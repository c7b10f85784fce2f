//! Baseline Store: the persistent catalog of regulations, countries,
//! industries, and topics, plus confidence recomputation.
//!
//! In-memory `DashMap`s guarded by `parking_lot` for the atomic
//! read-recompute-write critical section `record_verification` needs;
//! a background snapshot task (wired by the caller) can periodically
//! serialize the map to disk the way the teacher's stores persist
//! without making every read/write path itself async.

use crate::compliance::errors::{ComplianceResult, StorageError};
use crate::compliance::types::{
    BaselineStatistics, Country, Industry, MandatoryKeyword, RegulationBaseline, RegulationId,
    RegulationIdentity, Topic, VerificationLog, VerificationType,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Optional filter set for `BaselineStore::query`.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub country_code: Option<String>,
    pub industry_code: Option<String>,
    pub topic_code: Option<String>,
    pub mandatory: Option<bool>,
    pub verified: Option<bool>,
    pub min_confidence: Option<f64>,
}

pub struct BaselineStore {
    regulations: DashMap<RegulationId, RegulationBaseline>,
    /// `(name, country_code, industry_code)` → id, for idempotent `add`.
    identity_index: DashMap<RegulationIdentity, RegulationId>,
    logs: DashMap<RegulationId, Vec<VerificationLog>>,
    countries: DashMap<String, Country>,
    industries: DashMap<String, Industry>,
    topics: DashMap<String, Topic>,
    /// Serializes the read-recompute-write sequence in
    /// `record_verification` per regulation so concurrent verifications
    /// of the same regulation never interleave.
    verification_lock: Mutex<()>,
    snapshot_path: Option<PathBuf>,
}

impl BaselineStore {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            regulations: DashMap::new(),
            identity_index: DashMap::new(),
            logs: DashMap::new(),
            countries: DashMap::new(),
            industries: DashMap::new(),
            topics: DashMap::new(),
            verification_lock: Mutex::new(()),
            snapshot_path,
        }
    }

    pub fn seed_country(&self, country: Country) {
        self.countries.insert(country.code.clone(), country);
    }

    pub fn seed_industry(&self, industry: Industry) {
        self.industries.insert(industry.code.clone(), industry);
    }

    pub fn seed_topic(&self, topic: Topic) {
        self.topics.insert(topic.code.clone(), topic);
    }

    /// Idempotent on `(name, country_code, industry_code)`; returns the
    /// existing record unchanged if one matches.
    pub fn add(&self, reg: RegulationBaseline) -> RegulationBaseline {
        let identity = reg.identity();
        if let Some(existing_id) = self.identity_index.get(&identity) {
            if let Some(existing) = self.regulations.get(&*existing_id) {
                return existing.clone();
            }
        }
        let id = reg.id;
        self.identity_index.insert(identity, id);
        self.regulations.insert(id, reg.clone());
        self.persist_best_effort();
        reg
    }

    pub fn update(
        &self,
        id: RegulationId,
        f: impl FnOnce(&mut RegulationBaseline),
    ) -> ComplianceResult<RegulationBaseline> {
        let mut entry = self
            .regulations
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        f(&mut entry);
        entry.updated_at = Utc::now();
        let updated = entry.clone();
        drop(entry);
        self.persist_best_effort();
        Ok(updated)
    }

    /// Soft delete: sets `is_active=false`, never removes the row.
    pub fn delete(&self, id: RegulationId) -> ComplianceResult<()> {
        self.update(id, |r| r.is_active = false)?;
        Ok(())
    }

    pub fn get(&self, id: RegulationId) -> Option<RegulationBaseline> {
        self.regulations.get(&id).map(|r| r.clone())
    }

    /// Returns matches ordered by `(mandatory DESC, confidence DESC)`.
    pub fn query(&self, filter: &QueryFilter) -> Vec<RegulationBaseline> {
        let mut matches: Vec<RegulationBaseline> = self
            .regulations
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| r.is_active)
            .filter(|r| {
                filter
                    .country_code
                    .as_ref()
                    .is_none_or(|c| &r.country_code == c)
            })
            .filter(|r| {
                filter
                    .industry_code
                    .as_ref()
                    .is_none_or(|c| &r.industry_code == c || r.applicable_industries.contains(c))
            })
            .filter(|r| filter.topic_code.as_ref().is_none_or(|c| &r.topic_code == c))
            .filter(|r| filter.mandatory.is_none_or(|m| r.is_mandatory == m))
            .filter(|r| filter.verified.is_none_or(|v| r.is_verified == v))
            .filter(|r| {
                filter
                    .min_confidence
                    .is_none_or(|m| r.confidence_score >= m)
            })
            .collect();

        matches.sort_by(|a, b| {
            b.is_mandatory
                .cmp(&a.is_mandatory)
                .then(b.confidence_score.total_cmp(&a.confidence_score))
        });
        matches
    }

    pub fn mandatory_keywords(
        &self,
        country: &str,
        industry: Option<&str>,
        topic: Option<&str>,
    ) -> Vec<MandatoryKeyword> {
        let filter = QueryFilter {
            country_code: Some(country.to_string()),
            industry_code: industry.map(str::to_string),
            topic_code: topic.map(str::to_string),
            mandatory: Some(true),
            ..Default::default()
        };
        let mut keywords: Vec<MandatoryKeyword> = self
            .query(&filter)
            .into_iter()
            .flat_map(|reg| {
                reg.search_keywords.iter().map(move |kw| MandatoryKeyword {
                    keyword: kw.clone(),
                    regulation_name: reg.name.clone(),
                    regulation_id: reg.id,
                    priority: reg.search_priority,
                })
                .collect::<Vec<_>>()
            })
            .collect();
        keywords.sort_by_key(|k| k.priority);
        keywords
    }

    /// Atomically: bumps the relevant counter, stamps `last_verified_at`
    /// (and `last_found_at` if found), recomputes confidence, and
    /// appends a Verification Log row. The `verification_lock` mutex
    /// makes the whole read-recompute-write sequence a single critical
    /// section so two concurrent verifications of the same regulation
    /// can't interleave their reads and writes.
    pub fn record_verification(
        &self,
        id: RegulationId,
        found: bool,
        verification_type: VerificationType,
        search_query: Option<String>,
        search_results_count: Option<u32>,
        notes: Option<String>,
        verified_by: &str,
    ) -> ComplianceResult<VerificationLog> {
        let _guard = self.verification_lock.lock();

        let mut entry = self
            .regulations
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        let old_confidence = entry.confidence_score;
        let now = Utc::now();

        if found {
            entry.found_count += 1;
            entry.last_found_at = Some(now);
        } else {
            entry.not_found_count += 1;
        }
        entry.last_verified_at = Some(now);
        entry.confidence_score = recompute_confidence(&entry);
        entry.updated_at = now;
        let new_confidence = entry.confidence_score;
        drop(entry);

        let log = VerificationLog {
            id: uuid::Uuid::new_v4(),
            regulation_id: id,
            verification_type,
            was_found: found,
            search_query,
            search_results_count,
            old_confidence,
            new_confidence,
            notes,
            verified_by: verified_by.to_string(),
            verified_at: now,
        };
        self.logs.entry(id).or_default().push(log.clone());
        self.persist_best_effort();
        Ok(log)
    }

    pub fn verification_history(&self, id: RegulationId, limit: usize) -> Vec<VerificationLog> {
        self.logs
            .get(&id)
            .map(|entries| {
                let mut v = entries.clone();
                v.sort_by(|a, b| b.verified_at.cmp(&a.verified_at));
                v.truncate(limit);
                v
            })
            .unwrap_or_default()
    }

    /// Candidates for the Scheduled Verifier: active regulations whose
    /// `last_verified_at` is null or older than `days_threshold` days,
    /// ordered by `mandatory DESC`, capped at `max_count`.
    pub fn stale_candidates(&self, days_threshold: i64, max_count: usize) -> Vec<RegulationBaseline> {
        let cutoff = Utc::now() - chrono::Duration::days(days_threshold);
        let mut candidates: Vec<RegulationBaseline> = self
            .regulations
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| r.is_active)
            .filter(|r| r.last_verified_at.is_none_or(|t| t < cutoff))
            .collect();
        candidates.sort_by(|a, b| b.is_mandatory.cmp(&a.is_mandatory));
        candidates.truncate(max_count);
        candidates
    }

    pub fn statistics(&self) -> BaselineStatistics {
        let mut stats = BaselineStatistics::default();
        let mut by_country: HashMap<String, usize> = HashMap::new();
        let mut by_industry: HashMap<String, usize> = HashMap::new();

        for entry in self.regulations.iter() {
            let r = entry.value();
            if !r.is_active {
                continue;
            }
            stats.total += 1;
            if r.is_verified {
                stats.verified += 1;
            }
            if r.is_mandatory {
                stats.mandatory += 1;
            }
            *by_country.entry(r.country_code.clone()).or_insert(0) += 1;
            *by_industry.entry(r.industry_code.clone()).or_insert(0) += 1;
        }
        stats.by_country = by_country;
        stats.by_industry = by_industry;
        stats
    }

    fn persist_best_effort(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let snapshot: Vec<RegulationBaseline> =
            self.regulations.iter().map(|e| e.value().clone()).collect();
        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    tracing::warn!(error = %e, "baseline snapshot write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "baseline snapshot serialize failed"),
        }
    }
}

/// Pure function of the regulation's current attributes. Must match the
/// additive/subtractive terms and clamp exactly — this is the
/// corpus-of-record algorithm for this repository.
pub fn recompute_confidence(reg: &RegulationBaseline) -> f64 {
    let mut score: f64 = 0.0;

    if reg.is_verified {
        score += 0.3;
    }

    if let Some(url) = &reg.official_url {
        if url.contains(".gov") || url.contains(".go.") || url.contains(".gob") {
            score += 0.3;
        } else {
            score += 0.1;
        }
    }

    if let Some(found_at) = reg.last_found_at {
        let age_days = (Utc::now() - found_at).num_days();
        if age_days <= 30 {
            score += 0.2;
        } else if age_days <= 90 {
            score += 0.1;
        }
        if age_days > 90 {
            score -= 0.3;
        }
    }

    if reg.found_count >= 3 {
        score += 0.2;
    }

    if reg.not_found_count >= 3 {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}

pub type SharedBaselineStore = Arc<BaselineStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::types::RegulationBaseline;

    fn sample_identity() -> RegulationIdentity {
        RegulationIdentity {
            name: "個人資料保護法".into(),
            country_code: "TW".into(),
            industry_code: "FIN".into(),
        }
    }

    #[test]
    fn add_is_idempotent_on_identity() {
        let store = BaselineStore::new(None);
        let reg = RegulationBaseline::new_manual(sample_identity(), "PRIVACY".into());
        let first = store.add(reg.clone());
        let second = store.add(RegulationBaseline::new_manual(sample_identity(), "PRIVACY".into()));
        assert_eq!(first.id, second.id);
        assert_eq!(store.statistics().total, 1);
    }

    #[test]
    fn confidence_clamped_to_unit_interval() {
        let mut reg = RegulationBaseline::new_manual(sample_identity(), "PRIVACY".into());
        reg.is_verified = true;
        reg.official_url = Some("https://example.gov.tw".into());
        reg.found_count = 5;
        reg.last_found_at = Some(Utc::now());
        let score = recompute_confidence(&reg);
        assert!((0.0..=1.0).contains(&score));
        assert!(score >= 0.9);
    }

    #[test]
    fn stale_last_found_subtracts() {
        let mut reg = RegulationBaseline::new_manual(sample_identity(), "PRIVACY".into());
        reg.last_found_at = Some(Utc::now() - chrono::Duration::days(120));
        let score = recompute_confidence(&reg);
        assert!(score >= 0.0);
    }

    #[test]
    fn record_verification_increments_found_count_and_logs() {
        let store = BaselineStore::new(None);
        let reg = store.add(RegulationBaseline::new_manual(sample_identity(), "PRIVACY".into()));
        let log = store
            .record_verification(
                reg.id,
                true,
                VerificationType::Scheduled,
                Some("query".into()),
                Some(3),
                None,
                "system",
            )
            .unwrap();
        assert!(log.was_found);
        let updated = store.get(reg.id).unwrap();
        assert_eq!(updated.found_count, 1);
        assert!(updated.last_found_at.is_some());
        assert_eq!(store.verification_history(reg.id, 10).len(), 1);
    }

    #[test]
    fn query_orders_mandatory_then_confidence() {
        let store = BaselineStore::new(None);
        let mut low = RegulationBaseline::new_manual(
            RegulationIdentity {
                name: "A".into(),
                country_code: "TW".into(),
                industry_code: "FIN".into(),
            },
            "PRIVACY".into(),
        );
        low.is_mandatory = false;
        low.confidence_score = 0.9;
        let mut high = RegulationBaseline::new_manual(
            RegulationIdentity {
                name: "B".into(),
                country_code: "TW".into(),
                industry_code: "FIN".into(),
            },
            "PRIVACY".into(),
        );
        high.is_mandatory = true;
        high.confidence_score = 0.1;
        store.add(low);
        store.add(high);

        let results = store.query(&QueryFilter::default());
        assert!(results[0].is_mandatory);
    }

    #[test]
    fn delete_is_soft() {
        let store = BaselineStore::new(None);
        let reg = store.add(RegulationBaseline::new_manual(sample_identity(), "PRIVACY".into()));
        store.delete(reg.id).unwrap();
        let updated = store.get(reg.id).unwrap();
        assert!(!updated.is_active);
        assert!(store.query(&QueryFilter::default()).is_empty());
    }
}
