//! `fetch_webpage` — fetch an HTML page and optionally text-extract it,
//! stripping script/style/nav/footer content and truncating to a fixed
//! character budget.

use super::fetcher::{FetchOptions, Fetcher};
use super::{optional_bool, required_str, Tool};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};

/// Matches spec.md §4.9's enrichment content cap so a page fetched
/// standalone and a page fetched during enrichment truncate identically.
pub const MAX_CONTENT_CHARS: usize = 10_000;

pub struct FetchWebpageTool {
    fetcher: Arc<Fetcher>,
}

impl FetchWebpageTool {
    pub fn new(fetcher: Arc<Fetcher>) -> Arc<Self> {
        Arc::new(Self { fetcher })
    }
}

#[async_trait]
impl Tool for FetchWebpageTool {
    fn name(&self) -> &'static str {
        "fetch_webpage"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "fetch_webpage",
            "description": "Fetch an HTML page and optionally extract readable text from it.",
            "parameters": {
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "extract_text": {"type": "boolean"},
                },
                "required": ["url"],
            },
        })
    }

    async fn invoke(&self, args: Value) -> Value {
        let url = match required_str(&args, "url") {
            Ok(u) => u,
            Err(e) => return e,
        };
        let extract_text = optional_bool(&args, "extract_text", true);

        match self.fetcher.fetch_text(&url, &FetchOptions::default()).await {
            Ok(html) => {
                if extract_text {
                    json!({
                        "status": "success",
                        "content": truncate_with_marker(&extract_readable_text(&html), MAX_CONTENT_CHARS),
                        "content_type": "text",
                    })
                } else {
                    json!({
                        "status": "success",
                        "content": truncate_with_marker(&html, MAX_CONTENT_CHARS),
                        "content_type": "html",
                    })
                }
            }
            Err(e) => json!({
                "status": "error",
                "error": e.to_string(),
            }),
        }
    }
}

/// Strips script/style/nav/footer blocks and remaining tags, collapsing
/// whitespace the way a browser's "reader view" would.
pub fn extract_readable_text(html: &str) -> String {
    static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<(script|style|nav|footer|header)[^>]*>.*?</\1>").unwrap()
    });
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

    let without_blocks = BLOCK_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to `max_chars`, appending an explicit marker so downstream
/// consumers (and the LLM) can tell the content was cut.
pub fn truncate_with_marker(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    format!("{truncated}\n\n[... content truncated ...]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_blocks() {
        let html = "<html><head><style>body{color:red}</style></head><body><script>alert(1)</script><p>Hello world</p></body></html>";
        let text = extract_readable_text(html);
        assert!(!text.contains("alert"));
        assert!(!text.contains("color:red"));
        assert!(text.contains("Hello world"));
    }

    #[test]
    fn truncate_adds_marker_when_over_budget() {
        let content = "a".repeat(20);
        let truncated = truncate_with_marker(&content, 10);
        assert!(truncated.contains("truncated"));
        assert_eq!(truncated.chars().take(10).count(), 10);
    }

    #[test]
    fn truncate_passes_through_short_content() {
        let content = "short";
        assert_eq!(truncate_with_marker(content, 10), "short");
    }

    #[tokio::test]
    async fn requires_url() {
        let tool = FetchWebpageTool::new(Arc::new(Fetcher::new()));
        let result = tool.invoke(json!({})).await;
        assert_eq!(result["status"], "error");
    }
}
