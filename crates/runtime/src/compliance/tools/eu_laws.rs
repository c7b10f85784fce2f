//! `search_eu_laws` — built-in catalog of core EU instruments; falls
//! back to a web search scoped to the EUR-Lex portal on no hit.

use super::web_search::WebSearchTool;
use super::{optional_str, required_str, Tool};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};

/// (name, doc_type, celex/url)
pub static EU_LAW_CATALOG: LazyLock<Vec<(&'static str, &'static str, &'static str)>> =
    LazyLock::new(|| {
        vec![
            ("General Data Protection Regulation (GDPR)", "regulation", "https://eur-lex.europa.eu/eli/reg/2016/679/oj"),
            ("NIS2 Directive", "directive", "https://eur-lex.europa.eu/eli/dir/2022/2555/oj"),
            ("Digital Operational Resilience Act (DORA)", "regulation", "https://eur-lex.europa.eu/eli/reg/2022/2554/oj"),
            ("AI Act", "regulation", "https://eur-lex.europa.eu/eli/reg/2024/1689/oj"),
            ("eIDAS Regulation", "regulation", "https://eur-lex.europa.eu/eli/reg/2014/910/oj"),
            ("Payment Services Directive 2 (PSD2)", "directive", "https://eur-lex.europa.eu/eli/dir/2015/2366/oj"),
            ("ePrivacy Directive", "directive", "https://eur-lex.europa.eu/eli/dir/2002/58/oj"),
        ]
    });

pub struct SearchEuLawsTool {
    web_search: Arc<WebSearchTool>,
}

impl SearchEuLawsTool {
    pub fn new(web_search: Arc<WebSearchTool>) -> Arc<Self> {
        Arc::new(Self { web_search })
    }
}

#[async_trait]
impl Tool for SearchEuLawsTool {
    fn name(&self) -> &'static str {
        "search_eu_laws"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "search_eu_laws",
            "description": "Search the built-in EU legal-instrument catalog; falls back to EUR-Lex web search.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "doc_type": {"type": "string", "enum": ["all","regulation","directive","decision"]},
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
        let doc_type = optional_str(&args, "doc_type").unwrap_or_else(|| "all".to_string());

        let query_lower = query.to_lowercase();
        let results: Vec<Value> = EU_LAW_CATALOG
            .iter()
            .filter(|(name, kind, _)| {
                (doc_type == "all" || *kind == doc_type) && name.to_lowercase().contains(&query_lower)
            })
            .map(|(name, kind, url)| {
                json!({"title": name, "doc_type": kind, "url": url, "jurisdiction": "EU"})
            })
            .collect();

        if !results.is_empty() {
            return json!({"status": "success", "results": results, "count": results.len()});
        }

        let web_result = self
            .web_search
            .invoke(json!({
                "query": format!("{query} site:eur-lex.europa.eu"),
                "num_results": 5,
            }))
            .await;

        if web_result["status"] == "success" {
            let results = web_result["results"].clone();
            let count = results.as_array().map(Vec::len).unwrap_or(0);
            json!({"status": "success", "results": results, "count": count})
        } else {
            json!({"status": "success", "results": [], "count": 0})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_hit_returns_gdpr() {
        let tool = SearchEuLawsTool::new(WebSearchTool::new(None));
        let result = tool.invoke(json!({"query": "data protection"})).await;
        assert_eq!(result["status"], "success");
        assert!(result["count"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn missing_query_returns_error() {
        let tool = SearchEuLawsTool::new(WebSearchTool::new(None));
        let result = tool.invoke(json!({})).await;
        assert_eq!(result["status"], "error");
    }

    #[tokio::test]
    async fn no_catalog_hit_falls_back_to_web_search_shape() {
        let tool = SearchEuLawsTool::new(WebSearchTool::new(None));
        let result = tool.invoke(json!({"query": "nonexistent instrument xyz"})).await;
        assert_eq!(result["status"], "success");
        assert_eq!(result["count"], 0);
    }
}
