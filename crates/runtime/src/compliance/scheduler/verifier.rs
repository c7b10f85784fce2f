//! Scheduled Verifier: periodically re-probes stale regulation baselines
//! via `web_search`, ported from `database/verifier.py: verify_stale`.

use crate::compliance::baseline::SharedBaselineStore;
use crate::compliance::tools::ToolRegistry;
use crate::compliance::types::VerificationType;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DAYS_THRESHOLD: i64 = 30;
pub const DEFAULT_MAX_COUNT: usize = 50;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);
const PROBE_NUM_RESULTS: u64 = 3;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CountryTally {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub errors: usize,
    pub by_country: HashMap<String, CountryTally>,
}

pub struct ScheduledVerifier {
    store: SharedBaselineStore,
    tools: Arc<ToolRegistry>,
    days_threshold: i64,
    max_count: usize,
    delay: Duration,
}

impl ScheduledVerifier {
    pub fn new(store: SharedBaselineStore, tools: Arc<ToolRegistry>) -> Self {
        Self {
            store,
            tools,
            days_threshold: DEFAULT_DAYS_THRESHOLD,
            max_count: DEFAULT_MAX_COUNT,
            delay: DEFAULT_DELAY,
        }
    }

    pub fn with_thresholds(mut self, days_threshold: i64, max_count: usize) -> Self {
        self.days_threshold = days_threshold;
        self.max_count = max_count;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Re-probes every stale candidate in sequence (not parallel — this
    /// respects search-provider rate limits, same as the prototype's
    /// inter-candidate sleep). A single candidate's failure is recorded
    /// as an error and does not stop the run.
    pub async fn run(&self) -> VerificationSummary {
        let candidates = self.store.stale_candidates(self.days_threshold, self.max_count);
        let total = candidates.len();
        tracing::info!(total, "scheduled verification starting");

        let mut summary = VerificationSummary {
            total,
            ..Default::default()
        };

        for (i, reg) in candidates.iter().enumerate() {
            let keyword = reg
                .search_keywords
                .first()
                .cloned()
                .unwrap_or_else(|| reg.name.clone());

            let tally = summary
                .by_country
                .entry(reg.country_code.clone())
                .or_default();
            tally.total += 1;

            match self.probe_and_record(reg.id, &keyword).await {
                Ok(found) => {
                    if found {
                        summary.found += 1;
                        tally.found += 1;
                    } else {
                        summary.not_found += 1;
                        tally.not_found += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(regulation = %reg.name, error = %e, "verification probe failed");
                    summary.errors += 1;
                }
            }

            if i + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        tracing::info!(
            found = summary.found,
            not_found = summary.not_found,
            errors = summary.errors,
            "scheduled verification complete"
        );
        summary
    }

    async fn probe_and_record(
        &self,
        id: crate::compliance::types::RegulationId,
        keyword: &str,
    ) -> Result<bool, String> {
        let result = self
            .tools
            .invoke(
                "web_search",
                json!({"query": keyword, "num_results": PROBE_NUM_RESULTS}),
            )
            .await;

        let status_ok = result["status"] == "success";
        let results_count = result["results"].as_array().map(Vec::len).unwrap_or(0);
        let found = status_ok && results_count > 0;

        if !status_ok {
            return Err(result["error"]
                .as_str()
                .unwrap_or("web_search failed")
                .to_string());
        }

        self.store
            .record_verification(
                id,
                found,
                VerificationType::Scheduled,
                Some(keyword.to_string()),
                Some(results_count as u32),
                None,
                "system",
            )
            .map_err(|e| e.to_string())?;
        Ok(found)
    }
}
