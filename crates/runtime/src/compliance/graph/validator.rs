//! Validator Node: turns the Researcher's collected `FoundItem`s into a
//! cited, confidence-scored answer. Ported from the Validator contract
//! implied by `langgraph_team.py`'s import list and `tool_executor.py`'s
//! result-shape conventions; retry/degradation behavior mirrors the
//! Planner's structured-output discipline.

use crate::compliance::errors::{ComplianceResult, ParseError};
use crate::compliance::graph::json_extract::extract_json;
use crate::compliance::prompts;
use crate::compliance::types::{AgentState, AgentStatus, FoundItem};
use crate::reasoning::conversation::{Conversation, ConversationMessage};
use crate::reasoning::inference::{InferenceOptions, InferenceProvider, ResponseFormat};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Overall prompt budget across all `FoundItem`s' content.
pub const TARGET_TOTAL_CHARS: usize = 150_000;
/// Per-item cap once the items are packed into the prompt — distinct
/// from the Researcher's fetch-time `MAX_CONTENT_CHARS`, which is larger.
pub const MAX_CONTENT_LENGTH: usize = 2_000;
pub const MAX_RETRIES: usize = 3;

const DISCLAIMER_ZH: &str = "本回覆僅供參考，不構成法律意見，請諮詢合格之專業人士。";
const DISCLAIMER_EN: &str =
    "This response is for reference only and does not constitute legal advice; please consult a qualified professional.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedRegulation {
    pub name: String,
    pub issuing_authority: Option<String>,
    pub official_url: Option<String>,
    pub summary: String,
}

/// A dated regulatory event — enactment, amendment, or enforcement
/// milestone — relevant to the query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: String,
    pub event: String,
    #[serde(default)]
    pub regulation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disclaimer {
    pub zh: String,
    pub en: String,
}

impl Default for Disclaimer {
    fn default() -> Self {
        Self {
            zh: DISCLAIMER_ZH.to_string(),
            en: DISCLAIMER_EN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validation_result: String,
    pub summary: String,
    pub verified_regulations: Vec<VerifiedRegulation>,
    pub timeline: Vec<TimelineEntry>,
    pub compliance_checklist: Vec<String>,
    pub confidence_score: f64,
    pub warnings: Vec<String>,
    pub limitations: Vec<String>,
    pub disclaimer: Disclaimer,
}

#[derive(Debug, Deserialize)]
struct RawValidation {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    verified_regulations: Vec<VerifiedRegulation>,
    #[serde(default)]
    timeline: Vec<TimelineEntry>,
    #[serde(default)]
    compliance_checklist: Vec<String>,
    #[serde(default)]
    confidence_score: Option<f64>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    limitations: Vec<String>,
}

fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "verified_regulations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "issuing_authority": {"type": ["string", "null"]},
                        "official_url": {"type": ["string", "null"]},
                        "summary": {"type": "string"},
                    },
                    "required": ["name", "summary"],
                },
            },
            "timeline": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date": {"type": "string"},
                        "event": {"type": "string"},
                        "regulation": {"type": "string"},
                    },
                    "required": ["date", "event"],
                },
            },
            "compliance_checklist": {"type": "array", "items": {"type": "string"}},
            "confidence_score": {"type": "number"},
            "warnings": {"type": "array", "items": {"type": "string"}},
            "limitations": {"type": "array", "items": {"type": "string"}},
        },
        "required": ["summary", "verified_regulations", "confidence_score"],
    })
}

pub struct Validator {
    provider: Arc<dyn InferenceProvider>,
    system_prompt: String,
}

impl Validator {
    pub fn new(provider: Arc<dyn InferenceProvider>, prompts_dir: &Path) -> Self {
        Self {
            provider,
            system_prompt: prompts::load(prompts_dir, prompts::VALIDATOR),
        }
    }

    /// Always leaves `state.status == Completed`, even on exhausted
    /// retries — a degraded answer is produced rather than surfacing an
    /// error to the caller.
    pub async fn run(&self, state: &mut AgentState) -> ComplianceResult<()> {
        let prompt_body = build_evidence_prompt(&state.search_results);

        let mut conversation = Conversation::with_system(&self.system_prompt);
        conversation.push(ConversationMessage::user(format!(
            "Query: {}\n\nEvidence collected:\n{prompt_body}",
            state.query
        )));

        let options = InferenceOptions {
            response_format: ResponseFormat::JsonSchema {
                schema: response_schema(),
                name: Some("validation_result".to_string()),
            },
            ..Default::default()
        };

        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                conversation.push(ConversationMessage::user(format!(
                    "Your previous reply could not be parsed ({}). Reply with valid JSON matching the required schema only.",
                    last_error.as_deref().unwrap_or("unknown error")
                )));
            }

            let response = match self.provider.complete(&conversation, &options).await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            if response.content.trim().is_empty() {
                last_error = Some("empty response".to_string());
                continue;
            }

            match serde_json::from_str::<RawValidation>(extract_json(&response.content)) {
                Ok(raw) => {
                    state.validated_results = Some(serde_json::to_value(to_validation_result(raw))?);
                    state.status = AgentStatus::Completed;
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }
        }

        tracing::warn!(
            error = last_error.as_deref().unwrap_or("unknown"),
            "validator exhausted retries, returning degraded result"
        );
        state.validated_results = Some(serde_json::to_value(degraded_result(
            last_error.unwrap_or_else(|| "validator failed to produce a parseable result".to_string()),
        ))?);
        state.status = AgentStatus::Completed;
        Ok(())
    }
}

fn to_validation_result(raw: RawValidation) -> ValidationResult {
    ValidationResult {
        validation_result: "success".to_string(),
        summary: raw.summary,
        verified_regulations: raw.verified_regulations,
        timeline: raw.timeline,
        compliance_checklist: raw.compliance_checklist,
        confidence_score: raw.confidence_score.unwrap_or(0.5).clamp(0.0, 1.0),
        warnings: raw.warnings,
        limitations: raw.limitations,
        disclaimer: Disclaimer::default(),
    }
}

fn degraded_result(reason: String) -> ValidationResult {
    ValidationResult {
        validation_result: "error".to_string(),
        summary: "Unable to produce a verified answer from the collected evidence.".to_string(),
        verified_regulations: Vec::new(),
        timeline: Vec::new(),
        compliance_checklist: Vec::new(),
        confidence_score: 0.3,
        warnings: vec![reason],
        limitations: vec!["automatic validation failed; results require manual review".to_string()],
        disclaimer: Disclaimer::default(),
    }
}

/// Packs items into the prompt within `TARGET_TOTAL_CHARS`, truncating
/// each item's content to `MAX_CONTENT_LENGTH` first and dropping
/// trailing items if the budget is still exceeded.
fn build_evidence_prompt(items: &[FoundItem]) -> String {
    let mut out = String::new();
    let mut used = 0usize;

    for (i, item) in items.iter().enumerate() {
        let content = item
            .full_content
            .as_deref()
            .map(|c| truncate_chars(c, MAX_CONTENT_LENGTH))
            .unwrap_or_default();

        let entry = format!(
            "[{}] {}\nurl: {}\nsnippet: {}\n{}\n\n",
            i + 1,
            item.title,
            item.url.as_deref().unwrap_or("(none)"),
            item.snippet,
            content
        );

        if used + entry.len() > TARGET_TOTAL_CHARS {
            break;
        }
        used += entry.len();
        out.push_str(&entry);
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::types::ContentType;
    use crate::reasoning::inference::{FinishReason, InferenceError, InferenceResponse, Usage};
    use async_trait::async_trait;

    struct StubProvider {
        bodies: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InferenceProvider for StubProvider {
        async fn complete(
            &self,
            _conversation: &Conversation,
            _options: &InferenceOptions,
        ) -> Result<InferenceResponse, InferenceError> {
            let mut bodies = self.bodies.lock().unwrap();
            let body = if bodies.len() > 1 { bodies.remove(0) } else { bodies[0].clone() };
            Ok(InferenceResponse {
                content: body,
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

    fn sample_item() -> FoundItem {
        FoundItem {
            title: "Personal Data Protection Act".to_string(),
            url: Some("https://law.moj.gov.tw/pdpa".to_string()),
            snippet: "governs personal data processing".to_string(),
            content_type: ContentType::Webpage,
            full_content: Some("full statute text".to_string()),
            content_fetched: true,
            fetch_error: None,
        }
    }

    #[tokio::test]
    async fn well_formed_response_parses_on_first_try() {
        let provider = Arc::new(StubProvider {
            bodies: std::sync::Mutex::new(vec![json!({
                "summary": "One regulation found.",
                "verified_regulations": [{"name": "PDPA", "summary": "data protection"}],
                "timeline": [{"date": "2010-05-26", "event": "PDPA promulgated", "regulation": "PDPA"}],
                "compliance_checklist": ["appoint a data officer"],
                "confidence_score": 0.8,
                "warnings": [],
                "limitations": [],
            }).to_string()]),
        });
        let validator = Validator::new(provider, Path::new("/nonexistent"));
        let mut state = AgentState::new("privacy law in Taiwan".to_string(), Some("TW".to_string()));
        state.search_results = vec![sample_item()];
        validator.run(&mut state).await.unwrap();
        assert_eq!(state.status, AgentStatus::Completed);
        let result: ValidationResult = serde_json::from_value(state.validated_results.unwrap()).unwrap();
        assert_eq!(result.validation_result, "success");
        assert_eq!(result.confidence_score, 0.8);
        assert_eq!(result.timeline.len(), 1);
        assert_eq!(result.compliance_checklist, vec!["appoint a data officer".to_string()]);
        assert_eq!(result.disclaimer.zh, DISCLAIMER_ZH);
        assert_eq!(result.disclaimer.en, DISCLAIMER_EN);
    }

    #[tokio::test]
    async fn malformed_then_valid_response_recovers_on_retry() {
        let provider = Arc::new(StubProvider {
            bodies: std::sync::Mutex::new(vec![
                "not json".to_string(),
                json!({
                    "summary": "recovered",
                    "verified_regulations": [],
                    "timeline": [],
                    "compliance_checklist": [],
                    "confidence_score": 0.6,
                }).to_string(),
            ]),
        });
        let validator = Validator::new(provider, Path::new("/nonexistent"));
        let mut state = AgentState::new("q".to_string(), None);
        validator.run(&mut state).await.unwrap();
        assert_eq!(state.status, AgentStatus::Completed);
        let result: ValidationResult = serde_json::from_value(state.validated_results.unwrap()).unwrap();
        assert_eq!(result.validation_result, "success");
    }

    #[tokio::test]
    async fn exhausted_retries_yield_degraded_result_and_still_completes() {
        let provider = Arc::new(StubProvider {
            bodies: std::sync::Mutex::new(vec!["not json".to_string()]),
        });
        let validator = Validator::new(provider, Path::new("/nonexistent"));
        let mut state = AgentState::new("q".to_string(), None);
        validator.run(&mut state).await.unwrap();
        assert_eq!(state.status, AgentStatus::Completed);
        let result: ValidationResult = serde_json::from_value(state.validated_results.unwrap()).unwrap();
        assert_eq!(result.validation_result, "error");
        assert_eq!(result.confidence_score, 0.3);
        assert!(!result.disclaimer.zh.is_empty());
        assert!(!result.disclaimer.en.is_empty());
        assert!(result.timeline.is_empty());
        assert!(result.compliance_checklist.is_empty());
    }

    #[test]
    fn evidence_prompt_respects_total_char_budget() {
        let items: Vec<FoundItem> = (0..5)
            .map(|i| {
                let mut item = sample_item();
                item.title = format!("item {i}");
                item.full_content = Some("x".repeat(MAX_CONTENT_LENGTH * 2));
                item
            })
            .collect();
        let prompt = build_evidence_prompt(&items);
        assert!(prompt.len() <= TARGET_TOTAL_CHARS + 1000);
    }
}
