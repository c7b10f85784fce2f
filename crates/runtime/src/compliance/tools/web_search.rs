//! `web_search` — delegates to a Google Programmable Search Engine
//! (primary) and is the fallback path `search_eu_laws` reaches for.

use super::{optional_bool, optional_str, optional_u64, required_str, Tool};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Search provider credentials. Cloned cheaply into each call.
#[derive(Clone)]
pub struct SearchProviderConfig {
    pub api_key: String,
    pub engine_id: String,
}

pub struct WebSearchTool {
    config: Option<SearchProviderConfig>,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(config: Option<SearchProviderConfig>) -> Arc<Self> {
        Arc::new(Self {
            config,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "web_search",
            "description": "Search the open web via a general-purpose search engine.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "region": {"type": "string"},
                    "num_results": {"type": "integer"},
                    "date_restrict": {"type": "string", "enum": ["d7","d30","w2","m1","m3","m6","y1","y2","y5"]},
                    "file_type": {"type": "string"},
                    "exact_terms": {"type": "string"},
                    "exclude_terms": {"type": "string"},
                    "or_terms": {"type": "string"},
                    "sort_by_date": {"type": "boolean"},
                    "disable_duplicate_filter": {"type": "boolean"},
                },
                "required": ["query"],
            },
        })
    }

    async fn invoke(&self, args: Value) -> Value {
        let query = match required_str(&args, "query") {
            Ok(q) => q,
            Err(e) => return e,
        };
        let Some(config) = &self.config else {
            return json!({
                "status": "error",
                "error": "web search provider is not configured",
            });
        };

        let num_results = optional_u64(&args, "num_results", 10).clamp(1, 20);
        let region = optional_str(&args, "region");

        let mut request = self
            .client
            .get("https://www.googleapis.com/customsearch/v1")
            .query(&[
                ("key", config.api_key.as_str()),
                ("cx", config.engine_id.as_str()),
                ("q", query.as_str()),
                ("num", &num_results.to_string()),
            ]);

        if let Some(date_restrict) = optional_str(&args, "date_restrict") {
            request = request.query(&[("dateRestrict", date_restrict)]);
        }
        if let Some(file_type) = optional_str(&args, "file_type") {
            request = request.query(&[("fileType", file_type)]);
        }
        if let Some(exact) = optional_str(&args, "exact_terms") {
            request = request.query(&[("exactTerms", exact)]);
        }
        if let Some(exclude) = optional_str(&args, "exclude_terms") {
            request = request.query(&[("excludeTerms", exclude)]);
        }
        if let Some(or_terms) = optional_str(&args, "or_terms") {
            request = request.query(&[("orTerms", or_terms)]);
        }
        if optional_bool(&args, "sort_by_date", false) {
            request = request.query(&[("sort", "date")]);
        }
        if let Some(region) = &region {
            request = request.query(&[("gl", region.as_str())]);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                return json!({"status": "error", "error": format!("search request failed: {e}")})
            }
        };

        if !response.status().is_success() {
            return json!({
                "status": "error",
                "error": format!("search provider returned status {}", response.status()),
            });
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return json!({"status": "error", "error": format!("invalid search response: {e}")})
            }
        };

        let mut results: Vec<Value> = body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|item| {
                json!({
                    "title": item.get("title").cloned().unwrap_or(Value::Null),
                    "url": item.get("link").cloned().unwrap_or(Value::Null),
                    "snippet": item.get("snippet").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        if !optional_bool(&args, "disable_duplicate_filter", false) {
            let mut seen = std::collections::HashSet::new();
            results.retain(|r| {
                let url = r.get("url").and_then(Value::as_str).unwrap_or_default();
                seen.insert(url.to_string())
            });
        }

        json!({
            "status": "success",
            "results": results,
            "search_engine": "google_custom_search",
            "region": region,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_provider_returns_error_document() {
        let tool = WebSearchTool::new(None);
        let result = tool.invoke(json!({"query": "test"})).await;
        assert_eq!(result["status"], "error");
    }

    #[tokio::test]
    async fn missing_query_returns_error_document() {
        let tool = WebSearchTool::new(Some(SearchProviderConfig {
            api_key: "k".into(),
            engine_id: "e".into(),
        }));
        let result = tool.invoke(json!({})).await;
        assert_eq!(result["status"], "error");
    }
}
