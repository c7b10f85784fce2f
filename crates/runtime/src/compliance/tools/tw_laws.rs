//! `search_tw_laws` / `fetch_tw_law_content` — Taiwan's 全國法規資料庫
//! (National Laws & Regulations Database), with a built-in catalog
//! fallback when the remote site is unreachable.

use super::fetcher::{FetchOptions, Fetcher};
use super::{optional_u64, required_str, Tool};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

const BASE_URL: &str = "https://law.moj.gov.tw";

/// Common Taiwan statute names mapped to their official `pcode`.
/// Used as a fallback catalog when the remote search/fetch fails, and
/// as the direct lookup path for `fetch_tw_law_content` callers that
/// already know a law by name rather than by code.
pub static COMMON_TW_LAWS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("個人資料保護法", "I0050021"),
        ("個資法", "I0050021"),
        ("資通安全管理法", "A0030297"),
        ("資安法", "A0030297"),
        ("電子簽章法", "J0080037"),
        ("洗錢防制法", "G0380131"),
        ("金融科技發展與創新實驗條例", "G0380236"),
        ("電信管理法", "K0060001"),
        ("銀行法", "G0380001"),
        ("證券交易法", "G0400001"),
        ("保險法", "G0390002"),
        ("醫療法", "L0020021"),
        ("藥事法", "L0030001"),
        ("食品安全衛生管理法", "L0040001"),
        ("勞動基準法", "N0030001"),
        ("職業安全衛生法", "N0060001"),
        ("消費者保護法", "J0170001"),
        ("公司法", "J0080001"),
        ("營業秘密法", "J0080028"),
        ("著作權法", "J0070017"),
        ("商標法", "J0070001"),
        ("專利法", "J0070007"),
        ("空氣污染防制法", "O0020001"),
        ("水污染防治法", "O0020004"),
        ("廢棄物清理法", "O0020007"),
        ("人工智慧基本法", "A0030298"),
    ])
});

pub struct TwLawsSearchTool {
    fetcher: Arc<Fetcher>,
}

impl TwLawsSearchTool {
    pub fn new(fetcher: Arc<Fetcher>) -> Arc<Self> {
        Arc::new(Self { fetcher })
    }
}

#[async_trait]
impl Tool for TwLawsSearchTool {
    fn name(&self) -> &'static str {
        "search_tw_laws"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "search_tw_laws",
            "description": "Search Taiwan's national statute database (全國法規資料庫).",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer"},
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
        let limit = optional_u64(&args, "limit", 20).clamp(1, 100) as usize;

        let search_url = format!(
            "{BASE_URL}/LawClass/LawSearchContent.aspx?type=TY&kw={}",
            urlencoding_encode(&query)
        );

        match self
            .fetcher
            .fetch_text(&search_url, &FetchOptions::default())
            .await
        {
            Ok(html) => {
                let results = parse_search_results(&html, limit);
                if results.is_empty() {
                    json!({
                        "status": "success",
                        "results": catalog_fallback(&query, limit),
                        "count": catalog_fallback(&query, limit).len(),
                    })
                } else {
                    json!({
                        "status": "success",
                        "results": results,
                        "count": results.len(),
                    })
                }
            }
            Err(e) => {
                let fallback = catalog_fallback(&query, limit);
                json!({
                    "status": "success",
                    "results": fallback,
                    "count": fallback.len(),
                    "note": format!("remote search failed ({e}); served from built-in catalog"),
                })
            }
        }
    }
}

fn catalog_fallback(query: &str, limit: usize) -> Vec<Value> {
    COMMON_TW_LAWS
        .iter()
        .filter(|(name, _)| name.contains(query) || query.contains(*name))
        .take(limit)
        .map(|(name, pcode)| {
            json!({
                "title": name,
                "pcode": pcode,
                "url": format!("{BASE_URL}/LawClass/LawAll.aspx?pcode={pcode}"),
                "jurisdiction": "TW",
                "type": "statute",
            })
        })
        .collect()
}

fn parse_search_results(html: &str, limit: usize) -> Vec<Value> {
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"<a[^>]+href="[^"]*pcode=([A-Z0-9]+)[^"]*"[^>]*>([^<]+)</a>"#).unwrap()
    });
    LINK_RE
        .captures_iter(html)
        .take(limit)
        .map(|c| {
            let pcode = c[1].to_string();
            let title = c[2].trim().to_string();
            json!({
                "title": title,
                "pcode": pcode,
                "url": format!("{BASE_URL}/LawClass/LawAll.aspx?pcode={pcode}"),
                "jurisdiction": "TW",
                "type": "statute",
            })
        })
        .collect()
}

pub struct TwLawContentTool {
    fetcher: Arc<Fetcher>,
}

impl TwLawContentTool {
    pub fn new(fetcher: Arc<Fetcher>) -> Arc<Self> {
        Arc::new(Self { fetcher })
    }
}

#[async_trait]
impl Tool for TwLawContentTool {
    fn name(&self) -> &'static str {
        "fetch_tw_law_content"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "fetch_tw_law_content",
            "description": "Retrieve full articles for a Taiwan statute by pcode (e.g. I0050021).",
            "parameters": {
                "type": "object",
                "properties": {
                    "pcode": {"type": "string"},
                },
                "required": ["pcode"],
            },
        })
    }

    async fn invoke(&self, args: Value) -> Value {
        let pcode = match required_str(&args, "pcode") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let url = format!("{BASE_URL}/LawClass/LawAll.aspx?pcode={pcode}");

        match self
            .fetcher
            .fetch_text(&url, &FetchOptions::default())
            .await
        {
            Ok(html) => {
                let (title, articles_count) = parse_law_page(&html);
                json!({
                    "status": "success",
                    "title": title,
                    "content": strip_tags(&html),
                    "articles_count": articles_count,
                    "pcode": pcode,
                })
            }
            Err(e) => json!({
                "status": "error",
                "error": format!("failed to fetch law content for {pcode}: {e}"),
            }),
        }
    }
}

fn parse_law_page(html: &str) -> (String, usize) {
    static TITLE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"<title>([^<]+)</title>"#).unwrap());
    static ARTICLE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"第\s*[一二三四五六七八九十百千0-9]+\s*條"#).unwrap());

    let title = TITLE_RE
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();
    let articles_count = ARTICLE_RE.find_iter(html).count();
    (title, articles_count)
}

fn strip_tags(html: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
    let text = TAG_RE.replace_all(html, " ");
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(10_000).collect()
}

fn urlencoding_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_laws_catalog_has_personal_data_act() {
        assert_eq!(COMMON_TW_LAWS.get("個人資料保護法"), Some(&"I0050021"));
    }

    #[test]
    fn catalog_fallback_matches_by_substring() {
        let results = catalog_fallback("個資", 5);
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn search_tool_requires_query() {
        let tool = TwLawsSearchTool::new(Arc::new(Fetcher::new()));
        let result = tool.invoke(json!({})).await;
        assert_eq!(result["status"], "error");
    }

    #[tokio::test]
    async fn content_tool_requires_pcode() {
        let tool = TwLawContentTool::new(Arc::new(Fetcher::new()));
        let result = tool.invoke(json!({})).await;
        assert_eq!(result["status"], "error");
    }
}
