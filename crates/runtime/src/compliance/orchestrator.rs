//! Orchestrator: drives the Planner → Researcher → Validator graph over
//! an `AgentState`, emitting a `PhaseEvent` at each transition. This is
//! the explicit state machine that replaces the dynamic LangGraph graph
//! compiled at runtime in the original implementation.

use crate::compliance::baseline::SharedBaselineStore;
use crate::compliance::errors::ComplianceResult;
use crate::compliance::graph::planner::Planner;
use crate::compliance::graph::researcher::Researcher;
use crate::compliance::graph::validator::Validator;
use crate::compliance::types::{AgentState, AgentStatus, PhaseEvent};
use tokio::sync::mpsc::UnboundedSender;

pub struct Orchestrator {
    planner: Planner,
    researcher: Researcher,
    validator: Validator,
    baseline: SharedBaselineStore,
}

impl Orchestrator {
    pub fn new(
        planner: Planner,
        researcher: Researcher,
        validator: Validator,
        baseline: SharedBaselineStore,
    ) -> Self {
        Self {
            planner,
            researcher,
            validator,
            baseline,
        }
    }

    /// Runs the graph to completion. `events` is best-effort: a closed
    /// receiver (caller dropped) does not abort the run.
    pub async fn run(
        &self,
        mut state: AgentState,
        events: &UnboundedSender<PhaseEvent>,
    ) -> ComplianceResult<AgentState> {
        emit(events, PhaseEvent::EnteringPlanner);
        if let Err(e) = self.planner.run(&mut state).await {
            state.status = AgentStatus::Error;
            state.error = Some(e.to_string());
            emit(events, PhaseEvent::Error { message: e.to_string() });
            return Err(e);
        }

        if state.status == AgentStatus::NeedsClarification {
            emit(
                events,
                PhaseEvent::Clarification {
                    questions: state.questions.clone(),
                },
            );
            return Ok(state);
        }

        let analysis = state
            .planner_analysis
            .as_ref()
            .expect("Planner must set planner_analysis when not requesting clarification");
        emit(
            events,
            PhaseEvent::PlannerDone {
                region: analysis.understood.region.clone(),
                topic: analysis.understood.topic.clone(),
            },
        );

        let mandatory_keywords = match (&analysis.understood.region, &analysis.understood.topic) {
            (Some(region), topic) => self.baseline.mandatory_keywords(
                region,
                analysis.understood.industry.as_deref(),
                topic.as_deref(),
            ),
            (None, _) => Vec::new(),
        };

        emit(
            events,
            PhaseEvent::EnteringResearcher {
                planned_searches: analysis.search_plan.len(),
            },
        );
        if let Err(e) = self.researcher.run(&mut state, &mandatory_keywords).await {
            state.status = AgentStatus::Error;
            state.error = Some(e.to_string());
            emit(events, PhaseEvent::Error { message: e.to_string() });
            return Err(e);
        }
        let enriched_count = state
            .search_results
            .iter()
            .filter(|i| i.content_fetched)
            .count();
        emit(
            events,
            PhaseEvent::ResearcherDone {
                result_count: state.search_results.len(),
                enriched_count,
            },
        );

        emit(events, PhaseEvent::EnteringValidator);
        if let Err(e) = self.validator.run(&mut state).await {
            state.status = AgentStatus::Error;
            state.error = Some(e.to_string());
            emit(events, PhaseEvent::Error { message: e.to_string() });
            return Err(e);
        }

        let (regulation_count, checklist_count) = state
            .validated_results
            .as_ref()
            .map(|v| {
                let regs = v
                    .get("verified_regulations")
                    .and_then(|r| r.as_array())
                    .map(|a| a.len())
                    .unwrap_or(0);
                let checklist = v
                    .get("compliance_checklist")
                    .and_then(|c| c.as_array())
                    .map(|a| a.len())
                    .unwrap_or(0);
                (regs, checklist)
            })
            .unwrap_or((0, 0));
        emit(
            events,
            PhaseEvent::ValidatorDone {
                regulation_count,
                checklist_count,
            },
        );

        Ok(state)
    }
}

fn emit(events: &UnboundedSender<PhaseEvent>, event: PhaseEvent) {
    tracing::info!(?event, "phase transition");
    let _ = events.send(event);
}
