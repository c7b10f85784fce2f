//! Planner Node: understands the query, decides whether clarification is
//! needed, and produces a search plan. Ported from `langgraph_team.py`'s
//! Planner node behavior (file itself only carries imports in the
//! retrieved source; behavior here follows the documented contract).

use crate::compliance::errors::{ComplianceResult, ParseError};
use crate::compliance::graph::json_extract::extract_json;
use crate::compliance::prompts;
use crate::compliance::types::{AgentState, AgentStatus, PlannerAnalysis, UnderstoodIntent};
use crate::reasoning::conversation::{Conversation, ConversationMessage};
use crate::reasoning::inference::{InferenceOptions, InferenceProvider, ResponseFormat};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct PlannerResponse {
    #[serde(default)]
    clarification_needed: bool,
    #[serde(default)]
    questions: Vec<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    is_follow_up: bool,
    #[serde(default)]
    time_requirement: Option<String>,
    #[serde(default)]
    search_plan: Vec<String>,
}

fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "clarification_needed": {"type": "boolean"},
            "questions": {"type": "array", "items": {"type": "string"}},
            "region": {"type": ["string", "null"]},
            "topic": {"type": ["string", "null"]},
            "industry": {"type": ["string", "null"]},
            "is_follow_up": {"type": "boolean"},
            "time_requirement": {"type": ["string", "null"]},
            "search_plan": {"type": "array", "items": {"type": "string"}},
        },
        "required": ["clarification_needed", "search_plan"],
    })
}

pub struct Planner {
    provider: Arc<dyn InferenceProvider>,
    system_prompt: String,
}

impl Planner {
    pub fn new(provider: Arc<dyn InferenceProvider>, prompts_dir: &Path) -> Self {
        Self {
            provider,
            system_prompt: prompts::load(prompts_dir, prompts::PLANNER),
        }
    }

    /// Mutates `state` in place: sets `planner_analysis`, `clarification_needed`,
    /// `questions`, and advances `status` to `ReadyToSearch` or `NeedsClarification`.
    pub async fn run(&self, state: &mut AgentState) -> ComplianceResult<()> {
        let mut conversation = Conversation::with_system(&self.system_prompt);
        if let Some(history) = &state.conversation_history {
            conversation.push(ConversationMessage::user(format!(
                "Prior conversation:\n{history}"
            )));
        }
        if let Some(jurisdiction) = &state.jurisdiction {
            conversation.push(ConversationMessage::user(format!(
                "Jurisdiction hint: {jurisdiction}"
            )));
        }
        conversation.push(ConversationMessage::user(&state.query));

        let options = InferenceOptions {
            response_format: ResponseFormat::JsonSchema {
                schema: response_schema(),
                name: Some("planner_analysis".to_string()),
            },
            ..Default::default()
        };

        let response = self.provider.complete(&conversation, &options).await?;
        let parsed: PlannerResponse = serde_json::from_str(extract_json(&response.content))
            .map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        if parsed.clarification_needed || parsed.search_plan.is_empty() {
            state.clarification_needed = true;
            state.questions = if parsed.questions.is_empty() {
                vec!["Could you clarify the jurisdiction and topic you're asking about?".to_string()]
            } else {
                parsed.questions
            };
            state.status = AgentStatus::NeedsClarification;
            return Ok(());
        }

        state.planner_analysis = Some(PlannerAnalysis {
            understood: UnderstoodIntent {
                region: parsed.region,
                topic: parsed.topic,
                industry: parsed.industry,
                is_follow_up: parsed.is_follow_up,
                time_requirement: parsed.time_requirement,
            },
            search_plan: parsed.search_plan,
        });
        state.clarification_needed = false;
        state.status = AgentStatus::ReadyToSearch;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::inference::{FinishReason, InferenceError, InferenceResponse, Usage};
    use async_trait::async_trait;

    struct StubProvider {
        body: String,
    }

    #[async_trait]
    impl InferenceProvider for StubProvider {
        async fn complete(
            &self,
            _conversation: &Conversation,
            _options: &InferenceOptions,
        ) -> Result<InferenceResponse, InferenceError> {
            Ok(InferenceResponse {
                content: self.body.clone(),
                tool_calls: vec![],
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
                model: "stub".to_string(),
            })
        }
        fn provider_name(&self) -> &str {
            "stub"
        }
        fn default_model(&self) -> &str {
            "stub"
        }
        fn supports_native_tools(&self) -> bool {
            false
        }
        fn supports_structured_output(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn concrete_plan_advances_to_ready_to_search() {
        let provider = Arc::new(StubProvider {
            body: json!({
                "clarification_needed": false,
                "region": "TW",
                "topic": "privacy",
                "search_plan": ["Taiwan personal data protection act"],
            })
            .to_string(),
        });
        let planner = Planner::new(provider, Path::new("/nonexistent"));
        let mut state = AgentState::new("what privacy laws apply in Taiwan".to_string(), Some("TW".to_string()));
        planner.run(&mut state).await.unwrap();
        assert_eq!(state.status, AgentStatus::ReadyToSearch);
        assert!(!state.clarification_needed);
        assert_eq!(
            state.planner_analysis.unwrap().search_plan,
            vec!["Taiwan personal data protection act"]
        );
    }

    #[tokio::test]
    async fn json_wrapped_in_fenced_code_block_still_parses() {
        let body = json!({
            "clarification_needed": false,
            "region": "TW",
            "search_plan": ["Taiwan data protection law"],
        });
        let provider = Arc::new(StubProvider {
            body: format!("```json\n{body}\n```"),
        });
        let planner = Planner::new(provider, Path::new("/nonexistent"));
        let mut state = AgentState::new("privacy rules in Taiwan".to_string(), Some("TW".to_string()));
        planner.run(&mut state).await.unwrap();
        assert_eq!(state.status, AgentStatus::ReadyToSearch);
    }

    #[tokio::test]
    async fn ambiguous_query_requests_clarification() {
        let provider = Arc::new(StubProvider {
            body: json!({
                "clarification_needed": true,
                "questions": ["Which country are you asking about?"],
                "search_plan": [],
            })
            .to_string(),
        });
        let planner = Planner::new(provider, Path::new("/nonexistent"));
        let mut state = AgentState::new("what regulations apply to me".to_string(), None);
        planner.run(&mut state).await.unwrap();
        assert_eq!(state.status, AgentStatus::NeedsClarification);
        assert_eq!(state.questions, vec!["Which country are you asking about?"]);
    }

    #[tokio::test]
    async fn empty_search_plan_without_explicit_flag_still_asks_for_clarification() {
        let provider = Arc::new(StubProvider {
            body: json!({"clarification_needed": false, "search_plan": []}).to_string(),
        });
        let planner = Planner::new(provider, Path::new("/nonexistent"));
        let mut state = AgentState::new("hello".to_string(), None);
        planner.run(&mut state).await.unwrap();
        assert_eq!(state.status, AgentStatus::NeedsClarification);
    }
}
