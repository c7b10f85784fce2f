//! Data model shared across the compliance query engine: regulation
//! baselines, verification logs, agent state, and found items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Unique identifier for a regulation baseline row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegulationId(pub uuid::Uuid);

impl RegulationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RegulationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RegulationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a regulation baseline: `(name, country_code, industry_code)`.
/// Immutable once created; used by `BaselineStore::add` for idempotence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegulationIdentity {
    pub name: String,
    pub country_code: String,
    pub industry_code: String,
}

/// A curated regulation record in the Baseline Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationBaseline {
    pub id: RegulationId,
    pub name: String,
    pub name_en: Option<String>,
    pub name_zh: Option<String>,
    pub country_code: String,
    pub industry_code: String,
    pub topic_code: String,
    pub regulation_type: Option<String>,
    pub issuing_authority: Option<String>,
    pub official_url: Option<String>,
    pub search_keywords: Vec<String>,
    /// Industries beyond `industry_code` this regulation also applies to.
    pub applicable_industries: Vec<String>,
    pub cross_industry: bool,
    pub is_mandatory: bool,
    pub search_priority: u32,
    pub confidence_score: f64,
    pub found_count: u32,
    pub not_found_count: u32,
    pub is_verified: bool,
    pub is_active: bool,
    pub source: String,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub last_found_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegulationBaseline {
    pub fn identity(&self) -> RegulationIdentity {
        RegulationIdentity {
            name: self.name.clone(),
            country_code: self.country_code.clone(),
            industry_code: self.industry_code.clone(),
        }
    }

    /// New manually-added regulation (mirrors the prototype's
    /// `source == "manual"` defaults: verified, confidence 0.5).
    pub fn new_manual(identity: RegulationIdentity, topic_code: String) -> Self {
        let ts = now();
        Self {
            id: RegulationId::new(),
            search_keywords: vec![identity.name.clone()],
            name: identity.name,
            name_en: None,
            name_zh: None,
            country_code: identity.country_code,
            industry_code: identity.industry_code,
            topic_code,
            regulation_type: None,
            issuing_authority: None,
            official_url: None,
            applicable_industries: Vec::new(),
            cross_industry: false,
            is_mandatory: false,
            search_priority: 1,
            confidence_score: 0.5,
            found_count: 0,
            not_found_count: 0,
            is_verified: true,
            is_active: true,
            source: "manual".to_string(),
            last_verified_at: None,
            last_found_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }
}

/// Append-only record of a single verification probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationLog {
    pub id: uuid::Uuid,
    pub regulation_id: RegulationId,
    pub verification_type: VerificationType,
    pub was_found: bool,
    pub search_query: Option<String>,
    pub search_results_count: Option<u32>,
    pub old_confidence: f64,
    pub new_confidence: f64,
    pub notes: Option<String>,
    pub verified_by: String,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    Scheduled,
    Manual,
    Search,
}

/// Reference rows, immutable after seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name_zh: String,
    pub name_en: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Industry {
    pub code: String,
    pub name_zh: String,
    pub name_en: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub code: String,
    pub name_zh: String,
    pub name_en: String,
}

/// A regulation's keyword surfaced for the Researcher's mandatory-keyword
/// prompt block. See `BaselineStore::mandatory_keywords`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandatoryKeyword {
    pub keyword: String,
    pub regulation_name: String,
    pub regulation_id: RegulationId,
    pub priority: u32,
}

/// Aggregate counts returned by `BaselineStore::statistics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineStatistics {
    pub total: usize,
    pub verified: usize,
    pub mandatory: usize,
    pub by_country: HashMap<String, usize>,
    pub by_industry: HashMap<String, usize>,
}

/// One search result flowing from the Researcher to the Validator,
/// possibly enriched with fetched page content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundItem {
    pub title: String,
    pub url: Option<String>,
    pub snippet: String,
    pub content_type: ContentType,
    pub full_content: Option<String>,
    pub content_fetched: bool,
    pub fetch_error: Option<String>,
}

impl FoundItem {
    /// Canonical URL used for dedup: `url | href | source_url` are
    /// treated as equivalent upstream fields; by the time an item reaches
    /// this type the field has already been normalized into `url`.
    pub fn canonical_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Pdf,
    Webpage,
    Unknown,
}

/// Status tag of an in-flight query run. Unknown tags are impossible by
/// construction — this is a closed Rust enum, not a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    NeedsClarification,
    ReadyToSearch,
    ReadyToValidate,
    Completed,
    Error,
}

/// Understood intent extracted by the Planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnderstoodIntent {
    pub region: Option<String>,
    pub topic: Option<String>,
    pub industry: Option<String>,
    pub is_follow_up: bool,
    pub time_requirement: Option<String>,
}

/// The Planner's parsed analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerAnalysis {
    pub understood: UnderstoodIntent,
    pub search_plan: Vec<String>,
}

/// Per-query-run in-memory state, created by the Handler, mutated by the
/// graph nodes in fixed order, consumed by the Handler and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub query: String,
    pub jurisdiction: Option<String>,
    pub conversation_history: Option<String>,
    pub previous_results_summary: Option<String>,
    pub planner_analysis: Option<PlannerAnalysis>,
    pub clarification_needed: bool,
    pub questions: Vec<String>,
    pub search_results: Vec<FoundItem>,
    pub validated_results: Option<serde_json::Value>,
    pub status: AgentStatus,
    pub error: Option<String>,
}

impl AgentState {
    pub fn new(query: String, jurisdiction: Option<String>) -> Self {
        Self {
            query,
            jurisdiction,
            conversation_history: None,
            previous_results_summary: None,
            planner_analysis: None,
            clarification_needed: false,
            questions: Vec::new(),
            search_results: Vec::new(),
            validated_results: None,
            status: AgentStatus::Starting,
            error: None,
        }
    }
}

/// Deterministic cache key derived from `(normalized_query, jurisdiction)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryFingerprint(pub String);

/// A cached report, written by the Handler on successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub stored_at: DateTime<Utc>,
    pub query: String,
    pub jurisdiction: Option<String>,
    pub result: serde_json::Value,
}

/// Summary row returned by `QueryCache::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSummary {
    pub id: String,
    pub query: String,
    pub jurisdiction: Option<String>,
    pub stored_at: DateTime<Utc>,
    pub age_minutes: i64,
}

/// One entry in the bounded History Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub original_query: String,
    pub full_query: String,
    pub result: serde_json::Value,
}

/// Summary row returned by `HistoryStore::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub id: String,
    pub query: String,
    pub age_minutes: i64,
    pub regulation_count: usize,
}

/// role ∈ {user, assistant}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn in a session's sliding-window conversation memory (spec.md
/// §4.6 — distinct from the Researcher/Validator's internal LLM
/// message history in `reasoning::conversation`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Discrete progress message emitted by the Orchestrator. Never carries
/// partial LLM tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseEvent {
    EnteringPlanner,
    PlannerDone {
        region: Option<String>,
        topic: Option<String>,
    },
    EnteringResearcher {
        planned_searches: usize,
    },
    ResearcherDone {
        result_count: usize,
        enriched_count: usize,
    },
    EnteringValidator,
    ValidatorDone {
        regulation_count: usize,
        checklist_count: usize,
    },
    Clarification {
        questions: Vec<String>,
    },
    Error {
        message: String,
    },
    CacheHit,
}
