//! Query Handler: the single entry point tying cache, the Planner/
//! Researcher/Validator graph, and the History Store together. Ported
//! from the prototype's top-level `handle_query` flow.

use crate::compliance::cache::{strip_clarification_appendix, QueryCache};
use crate::compliance::errors::ComplianceResult;
use crate::compliance::history::HistoryStore;
use crate::compliance::orchestrator::Orchestrator;
use crate::compliance::types::{AgentState, AgentStatus, PhaseEvent};
use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;

pub struct QueryHandler {
    orchestrator: Orchestrator,
    cache: QueryCache,
    history: HistoryStore,
}

impl QueryHandler {
    pub fn new(orchestrator: Orchestrator, cache: QueryCache, history: HistoryStore) -> Self {
        Self {
            orchestrator,
            cache,
            history,
        }
    }

    /// Runs one query end to end:
    /// 1. Strip any clarification appendix to get the cache key.
    /// 2. Unless `skip_cache`, try the cache; a hit short-circuits the graph.
    /// 3. Build `AgentState` and run the Orchestrator.
    /// 4. On `NeedsClarification`, return the uncached clarification envelope.
    /// 5. On success, cache and append to history.
    /// 6. On an unhandled error, emit an error event and propagate it.
    pub async fn handle(
        &self,
        query: &str,
        jurisdiction: Option<&str>,
        skip_cache: bool,
        events: &UnboundedSender<PhaseEvent>,
    ) -> ComplianceResult<serde_json::Value> {
        let original_query = strip_clarification_appendix(query).to_string();

        if !skip_cache {
            if let Some(entry) = self.cache.get(query, jurisdiction).await? {
                let _ = events.send(PhaseEvent::CacheHit);
                let mut envelope = entry.result;
                if let Some(obj) = envelope.as_object_mut() {
                    obj.insert("from_cache".to_string(), json!(true));
                }
                return Ok(envelope);
            }
        }

        let state = AgentState::new(query.to_string(), jurisdiction.map(str::to_string));
        let final_state = self.orchestrator.run(state, events).await?;

        if final_state.status == AgentStatus::NeedsClarification {
            return Ok(json!({
                "status": "clarification_needed",
                "query": query,
                "original_query": original_query,
                "questions": final_state.questions,
                "timestamp": Utc::now(),
            }));
        }

        let envelope = json!({
            "status": "success",
            "query": query,
            "original_query": original_query,
            "regulations": final_state.validated_results,
            "timestamp": Utc::now(),
            "from_cache": false,
        });

        self.cache.set(query, jurisdiction, envelope.clone()).await?;
        self.history.add(query, envelope.clone()).await?;

        Ok(envelope)
    }
}
