//! Researcher Node: runs search tool calls under LLM direction, dedups
//! results by canonical URL, and fans out a bounded, parallel
//! content-enrichment pass over the top results. The parallel-dispatch
//! shape (`buffer_unordered` + per-item `timeout`) is ported from
//! `reasoning::executor::DefaultActionExecutor`.

use crate::compliance::errors::ComplianceResult;
use crate::compliance::prompts;
use crate::compliance::tools::ToolRegistry;
use crate::compliance::types::{AgentState, AgentStatus, ContentType, FoundItem, MandatoryKeyword};
use crate::reasoning::conversation::{Conversation, ConversationMessage, ToolCall};
use crate::reasoning::inference::{InferenceOptions, InferenceProvider, ResponseFormat, ToolDefinition};
use futures::stream::StreamExt;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const MAX_SEARCH_ITERATIONS: usize = 15;
pub const TOP_N_TO_FETCH: usize = 50;
pub const MAX_WORKERS: usize = 10;
pub const ENRICH_TIMEOUT: Duration = Duration::from_secs(60);
pub const MAX_CONTENT_CHARS: usize = crate::compliance::tools::webpage::MAX_CONTENT_CHARS;

pub struct Researcher {
    provider: Arc<dyn InferenceProvider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
}

impl Researcher {
    pub fn new(provider: Arc<dyn InferenceProvider>, tools: Arc<ToolRegistry>, prompts_dir: &Path) -> Self {
        Self {
            provider,
            tools,
            system_prompt: prompts::load(prompts_dir, prompts::RESEARCHER),
        }
    }

    /// Runs the tool-calling loop (bounded by `MAX_SEARCH_ITERATIONS`),
    /// dedups the collected hits, fetches content for the top
    /// `TOP_N_TO_FETCH` in parallel, and stores the result on `state`.
    pub async fn run(
        &self,
        state: &mut AgentState,
        mandatory_keywords: &[MandatoryKeyword],
    ) -> ComplianceResult<()> {
        let analysis = state
            .planner_analysis
            .clone()
            .expect("Researcher requires a completed Planner analysis");

        let mut conversation = Conversation::with_system(&self.system_prompt);
        conversation.push(ConversationMessage::user(format!(
            "Search plan:\n{}",
            analysis.search_plan.join("\n")
        )));
        if !mandatory_keywords.is_empty() {
            let listed: Vec<String> = mandatory_keywords
                .iter()
                .map(|k| format!("- {} ({})", k.keyword, k.regulation_name))
                .collect();
            conversation.push(ConversationMessage::user(format!(
                "Mandatory keywords to also cover:\n{}",
                listed.join("\n")
            )));
        }

        let tool_definitions: Vec<ToolDefinition> = self
            .tools
            .schemas()
            .into_iter()
            .filter_map(schema_to_tool_definition)
            .collect();

        let options = InferenceOptions {
            tool_definitions,
            response_format: ResponseFormat::Text,
            ..Default::default()
        };

        let mut raw_results: Vec<serde_json::Value> = Vec::new();

        for _ in 0..MAX_SEARCH_ITERATIONS {
            let response = self.provider.complete(&conversation, &options).await?;
            if !response.has_tool_calls() {
                break;
            }

            let calls: Vec<ToolCall> = response
                .tool_calls
                .iter()
                .map(|tc| ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                })
                .collect();
            conversation.push(ConversationMessage::assistant_tool_calls(calls));

            for call in &response.tool_calls {
                let args: serde_json::Value =
                    serde_json::from_str(&call.arguments).unwrap_or(serde_json::Value::Null);
                let result = self.tools.invoke(&call.name, args).await;
                extract_results(&result, &mut raw_results);
                conversation.push(ConversationMessage::tool_result(
                    call.id.clone(),
                    call.name.clone(),
                    result.to_string(),
                ));
            }
        }

        let deduped = dedup_by_canonical_url(raw_results);
        let (to_fetch, rest) = split_top_n(deduped, TOP_N_TO_FETCH);
        let enriched = self.enrich(to_fetch).await;

        let enriched_count = enriched.iter().filter(|i| i.content_fetched).count();
        let mut all_items = enriched;
        all_items.extend(rest);

        state.search_results = all_items;
        state.status = AgentStatus::ReadyToValidate;
        tracing::info!(
            result_count = state.search_results.len(),
            enriched_count,
            "researcher pass complete"
        );
        Ok(())
    }

    /// Fetches full content for each item in parallel (bounded by
    /// `MAX_WORKERS` via `buffer_unordered`), each under its own
    /// `ENRICH_TIMEOUT`. Failures are recorded on the item, never abort
    /// the batch. Every item in `items` is collected exactly once.
    async fn enrich(&self, items: Vec<FoundItem>) -> Vec<FoundItem> {
        let tools = self.tools.clone();
        futures::stream::iter(items)
            .map(|item| {
                let tools = tools.clone();
                async move { enrich_one(&tools, item).await }
            })
            .buffer_unordered(MAX_WORKERS)
            .collect()
            .await
    }
}

async fn enrich_one(tools: &ToolRegistry, mut item: FoundItem) -> FoundItem {
    let Some(url) = item.url.clone() else {
        return item;
    };

    let tool_name = match item.content_type {
        ContentType::Pdf => "fetch_pdf_content",
        _ => "fetch_webpage",
    };

    let outcome = tokio::time::timeout(
        ENRICH_TIMEOUT,
        tools.invoke(tool_name, serde_json::json!({"url": url})),
    )
    .await;

    match outcome {
        Ok(result) if result["status"] == "success" => {
            let content = result["content"].as_str().unwrap_or_default();
            item.full_content = Some(truncate(content, MAX_CONTENT_CHARS));
            item.content_fetched = true;
        }
        Ok(result) => {
            item.fetch_error = Some(
                result["error"]
                    .as_str()
                    .unwrap_or("fetch failed")
                    .to_string(),
            );
        }
        Err(_) => {
            item.fetch_error = Some(format!("timed out after {ENRICH_TIMEOUT:?}"));
        }
    }
    item
}

fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let head: String = content.chars().take(max_chars).collect();
        format!("{head}\n\n[... content truncated ...]")
    }
}

fn schema_to_tool_definition(schema: serde_json::Value) -> Option<ToolDefinition> {
    Some(ToolDefinition {
        name: schema.get("name")?.as_str()?.to_string(),
        description: schema
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or_default()
            .to_string(),
        parameters: schema.get("parameters")?.clone(),
    })
}

fn extract_results(tool_result: &serde_json::Value, out: &mut Vec<serde_json::Value>) {
    if tool_result.get("status").and_then(|s| s.as_str()) == Some("error") {
        return;
    }
    if let Some(results) = tool_result.get("results").and_then(|r| r.as_array()) {
        out.extend(results.iter().cloned());
    } else if tool_result.is_object() {
        out.push(tool_result.clone());
    }
}

/// Dedup by `url | href | source_url`, keeping the first occurrence.
fn dedup_by_canonical_url(raw: Vec<serde_json::Value>) -> Vec<FoundItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for value in raw {
        let url = value
            .get("url")
            .or_else(|| value.get("href"))
            .or_else(|| value.get("source_url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        if let Some(u) = &url {
            if !seen.insert(u.clone()) {
                continue;
            }
        }

        let content_type = classify_content_type(url.as_deref(), &value);
        items.push(FoundItem {
            title: value
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string(),
            url,
            snippet: value
                .get("snippet")
                .and_then(|s| s.as_str())
                .unwrap_or_default()
                .to_string(),
            content_type,
            full_content: None,
            content_fetched: false,
            fetch_error: None,
        });
    }
    items
}

fn classify_content_type(url: Option<&str>, value: &serde_json::Value) -> ContentType {
    if value.get("is_pdf").and_then(|v| v.as_bool()) == Some(true) {
        return ContentType::Pdf;
    }
    match url {
        Some(u) if u.to_lowercase().ends_with(".pdf") || u.to_lowercase().contains("pdf") => {
            ContentType::Pdf
        }
        Some(_) => ContentType::Webpage,
        None => ContentType::Unknown,
    }
}

/// Items beyond `top_n` are kept (so the Validator can still cite their
/// snippet) but skip content fetching; `content_fetched` stays `false`.
fn split_top_n(items: Vec<FoundItem>, top_n: usize) -> (Vec<FoundItem>, Vec<FoundItem>) {
    if items.len() <= top_n {
        (items, Vec::new())
    } else {
        let mut items = items;
        let rest = items.split_off(top_n);
        (items, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dedup_keeps_first_occurrence_by_url() {
        let raw = vec![
            json!({"title": "A", "url": "https://x.gov/law"}),
            json!({"title": "A duplicate", "url": "https://x.gov/law"}),
            json!({"title": "B", "url": "https://y.gov/law"}),
        ];
        let items = dedup_by_canonical_url(raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "A");
    }

    #[test]
    fn dedup_treats_href_and_source_url_as_url() {
        let raw = vec![
            json!({"title": "A", "href": "https://x.gov/law"}),
            json!({"title": "A duplicate", "source_url": "https://x.gov/law"}),
        ];
        let items = dedup_by_canonical_url(raw);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn items_beyond_top_n_are_kept_but_unfetched() {
        let items: Vec<FoundItem> = (0..5)
            .map(|i| FoundItem {
                title: format!("item {i}"),
                url: Some(format!("https://x.gov/{i}")),
                snippet: String::new(),
                content_type: ContentType::Webpage,
                full_content: None,
                content_fetched: false,
                fetch_error: None,
            })
            .collect();
        let (to_fetch, rest) = split_top_n(items, 3);
        assert_eq!(to_fetch.len(), 3);
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|i| !i.content_fetched));
    }

    #[test]
    fn pdf_urls_are_classified_as_pdf() {
        let ty = classify_content_type(Some("https://gov.tw/doc.pdf"), &json!({}));
        assert_eq!(ty, ContentType::Pdf);
    }

    #[test]
    fn truncate_marks_overlong_content() {
        let long = "x".repeat(20);
        let truncated = truncate(&long, 5);
        assert!(truncated.starts_with("xxxxx"));
        assert!(truncated.contains("truncated"));
    }
}
