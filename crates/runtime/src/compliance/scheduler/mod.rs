//! Cron-driven wrapper around the Scheduled Verifier. A single job, not
//! the general-purpose multi-job cron engine `crate::scheduler` runs for
//! agent triggers — this one schedule, one task, ported from
//! `database/verifier.py`'s batch-verification entry points.

pub mod verifier;

use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Notify;
use verifier::{ScheduledVerifier, VerificationSummary};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
}

/// Runs `ScheduledVerifier::run` each time `cron_expression` fires,
/// until `shutdown` is notified. Uses the same `Notify`-based shutdown
/// signal as `crate::scheduler::cron_scheduler::CronScheduler`.
pub struct VerifierSchedule {
    schedule: Schedule,
    verifier: Arc<ScheduledVerifier>,
    shutdown: Arc<Notify>,
}

impl VerifierSchedule {
    pub fn new(cron_expression: &str, verifier: Arc<ScheduledVerifier>) -> Result<Self, SchedulerError> {
        let schedule = Schedule::from_str(cron_expression)
            .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;
        Ok(Self {
            schedule,
            verifier,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Runs until `shutdown_handle().notify_one()` is called elsewhere.
    /// Each fire's summary is logged; callers that want the summary
    /// itself should call `ScheduledVerifier::run` directly instead.
    pub async fn run_until_shutdown(&self) {
        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                tracing::warn!("cron schedule has no upcoming fires, stopping");
                return;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    let summary = self.verifier.run().await;
                    log_summary(&summary);
                }
                _ = self.shutdown.notified() => {
                    tracing::info!("verifier schedule shutting down");
                    return;
                }
            }
        }
    }
}

fn log_summary(summary: &VerificationSummary) {
    tracing::info!(
        total = summary.total,
        found = summary.found,
        not_found = summary.not_found,
        errors = summary.errors,
        "scheduled verification run complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_cron_expression_is_rejected() {
        let store = Arc::new(crate::compliance::baseline::BaselineStore::new(None));
        let tools = Arc::new(crate::compliance::tools::build_default_registry(
            &crate::compliance::config::AppConfig::default(),
        ));
        let verifier = Arc::new(ScheduledVerifier::new(store, tools));
        let result = VerifierSchedule::new("not a cron expression", verifier);
        assert!(result.is_err());
    }

    #[test]
    fn valid_six_field_cron_expression_is_accepted() {
        let store = Arc::new(crate::compliance::baseline::BaselineStore::new(None));
        let tools = Arc::new(crate::compliance::tools::build_default_registry(
            &crate::compliance::config::AppConfig::default(),
        ));
        let verifier = Arc::new(ScheduledVerifier::new(store, tools));
        // Daily at 03:00 — 6-field (with seconds), matching the `cron` crate's expectation.
        let result = VerifierSchedule::new("0 0 3 * * *", verifier);
        assert!(result.is_ok());
    }
}
