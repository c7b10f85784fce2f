//! `search_jp_laws` — built-in catalog of Japanese statutes, optionally
//! augmented by a web search when the query isn't a catalog hit.

use super::web_search::WebSearchTool;
use super::{optional_str, required_str, Tool};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// category → [(name, url)]
pub static JP_LAW_CATALOG: LazyLock<HashMap<&'static str, Vec<(&'static str, &'static str)>>> =
    LazyLock::new(|| {
        HashMap::from([
            (
                "法律",
                vec![
                    ("個人情報の保護に関する法律", "https://elaws.e-gov.go.jp/document?lawid=415AC0000000057"),
                    ("不正アクセス行為の禁止等に関する法律", "https://elaws.e-gov.go.jp/document?lawid=411AC0000000128"),
                    ("サイバーセキュリティ基本法", "https://elaws.e-gov.go.jp/document?lawid=426AC1000000104"),
                    ("電子署名及び認証業務に関する法律", "https://elaws.e-gov.go.jp/document?lawid=412AC0000000102"),
                ],
            ),
            (
                "政令",
                vec![("個人情報の保護に関する法律施行令", "https://elaws.e-gov.go.jp/document?lawid=415CO0000000507")],
            ),
            (
                "府令",
                vec![("個人情報の保護に関する法律施行規則", "https://elaws.e-gov.go.jp/document?lawid=428M60000002003")],
            ),
            (
                "規則",
                vec![("特定個人情報の適正な取扱いに関するガイドライン", "https://www.ppc.go.jp/legal/policy/")],
            ),
            (
                "ガイドライン",
                vec![("金融分野における個人情報保護に関するガイドライン", "https://www.fsa.go.jp/news/")],
            ),
        ])
    });

const BROAD_TOKENS: &[&str] = &["all", "相關", "list", "すべて", "全部"];

pub struct SearchJpLawsTool {
    web_search: Arc<WebSearchTool>,
}

impl SearchJpLawsTool {
    pub fn new(web_search: Arc<WebSearchTool>) -> Arc<Self> {
        Arc::new(Self { web_search })
    }
}

#[async_trait]
impl Tool for SearchJpLawsTool {
    fn name(&self) -> &'static str {
        "search_jp_laws"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "search_jp_laws",
            "description": "Search Japan's statute catalog, optionally augmented by web search.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "category": {"type": "string", "enum": ["all","法律","政令","府令","規則","ガイドライン"]},
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
        let category = optional_str(&args, "category").unwrap_or_else(|| "all".to_string());

        let is_broad = BROAD_TOKENS.iter().any(|t| query.to_lowercase().contains(t));

        let db_results: Vec<Value> = if is_broad {
            matching_categories(&category)
                .flat_map(|(cat, entries)| {
                    entries.iter().map(move |(name, url)| {
                        json!({"title": name, "url": url, "category": cat, "jurisdiction": "JP"})
                    })
                })
                .collect()
        } else {
            matching_categories(&category)
                .flat_map(|(cat, entries)| {
                    entries.iter().filter(|(name, _)| name.contains(&query)).map(move |(name, url)| {
                        json!({"title": name, "url": url, "category": cat, "jurisdiction": "JP"})
                    })
                })
                .collect()
        };

        let db_count = db_results.len();
        let mut results = db_results;
        let mut web_count = 0;

        if !is_broad && results.is_empty() {
            let web_result = self
                .web_search
                .invoke(json!({"query": format!("{query} 日本 法律"), "num_results": 5}))
                .await;
            if web_result["status"] == "success" {
                if let Some(items) = web_result["results"].as_array() {
                    web_count = items.len();
                    results.extend(items.iter().cloned());
                }
            }
        }

        json!({
            "status": "success",
            "results": results,
            "count": results.len(),
            "db_count": db_count,
            "web_count": web_count,
        })
    }
}

fn matching_categories(
    category: &str,
) -> impl Iterator<Item = (&'static str, &'static Vec<(&'static str, &'static str)>)> {
    let category = category.to_string();
    JP_LAW_CATALOG
        .iter()
        .filter(move |(cat, _)| category == "all" || **cat == category)
        .map(|(cat, entries)| (*cat, entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_personal_information_act() {
        let all: Vec<_> = JP_LAW_CATALOG.values().flatten().collect();
        assert!(all.iter().any(|(name, _)| name.contains("個人情報")));
    }

    #[tokio::test]
    async fn missing_query_returns_error() {
        let tool = SearchJpLawsTool::new(WebSearchTool::new(None));
        let result = tool.invoke(json!({})).await;
        assert_eq!(result["status"], "error");
    }

    #[tokio::test]
    async fn broad_query_returns_whole_category() {
        let tool = SearchJpLawsTool::new(WebSearchTool::new(None));
        let result = tool.invoke(json!({"query": "all", "category": "法律"})).await;
        assert_eq!(result["status"], "success");
        assert!(result["count"].as_u64().unwrap() >= 3);
    }
}
