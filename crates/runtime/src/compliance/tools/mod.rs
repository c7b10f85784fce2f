//! The closed, enumerated set of tools the Researcher may invoke.
//!
//! Every tool is total: it never propagates an `Err` past `invoke` —
//! failures are folded into `{"status": "error", ...}` JSON, the same
//! contract `tool_executor.py`'s `execute_tool` enforced in the
//! original implementation.

pub mod eu_laws;
pub mod fetcher;
pub mod jp_laws;
pub mod pdf_content;
pub mod tw_laws;
pub mod url_guard;
pub mod web_search;
pub mod webpage;

use crate::compliance::config::AppConfig;
use async_trait::async_trait;
use fetcher::Fetcher;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use web_search::{SearchProviderConfig, WebSearchTool};

/// Uniform tool interface. `name()` must match the identifier the LLM
/// uses in tool-call requests and in the JSON schema handed to it.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> Value;
    async fn invoke(&self, args: Value) -> Value;
}

/// `HashMap<String, Arc<dyn Tool>>` keyed by tool name, mirroring the
/// shape of the runtime's MCP client tool map.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn schemas(&self) -> Vec<Value> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Invoke a tool by name. Unknown names return a `{status: error}`
    /// document rather than panicking or propagating — the LLM sees the
    /// same shape for "tool doesn't exist" as for any other tool error.
    pub async fn invoke(&self, name: &str, args: Value) -> Value {
        match self.tools.get(name) {
            Some(tool) => tool.invoke(args).await,
            None => json!({
                "status": "error",
                "error": format!("unknown tool: {name}"),
                "available_tools": self.names(),
            }),
        }
    }
}

/// Builds the registry with all 7 tools wired to a shared `Fetcher` and
/// a shared `WebSearchTool` (jp/eu-laws fall back to it on catalog miss).
pub fn build_default_registry(config: &AppConfig) -> ToolRegistry {
    let fetcher = Arc::new(Fetcher::new());
    let search_config = config
        .search
        .api_key
        .clone()
        .zip(config.search.engine_id.clone())
        .map(|(api_key, engine_id)| SearchProviderConfig { api_key, engine_id });
    let web_search = WebSearchTool::new(search_config);

    let mut registry = ToolRegistry::new();
    registry.register(web_search.clone());
    registry.register(tw_laws::TwLawsSearchTool::new(fetcher.clone()));
    registry.register(tw_laws::TwLawContentTool::new(fetcher.clone()));
    registry.register(webpage::FetchWebpageTool::new(fetcher.clone()));
    registry.register(pdf_content::FetchPdfContentTool::new(fetcher.clone()));
    registry.register(jp_laws::SearchJpLawsTool::new(web_search.clone()));
    registry.register(eu_laws::SearchEuLawsTool::new(web_search));
    registry
}

/// Shared string-valued-arg accessor: tools take loosely-typed JSON
/// arguments from the LLM, so every tool validates its own required
/// fields rather than relying on serde to fail closed.
pub fn required_str(args: &Value, field: &str) -> Result<String, Value> {
    match args.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(json!({
            "status": "error",
            "error": format!("missing required argument: {field}"),
        })),
    }
}

pub fn optional_u64(args: &Value, field: &str, default: u64) -> u64 {
    args.get(field).and_then(Value::as_u64).unwrap_or(default)
}

pub fn optional_str(args: &Value, field: &str) -> Option<String> {
    args.get(field).and_then(Value::as_str).map(str::to_string)
}

pub fn optional_bool(args: &Value, field: &str, default: bool) -> bool {
    args.get(field).and_then(Value::as_bool).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn schema(&self) -> Value {
            json!({"name": "echo"})
        }
        async fn invoke(&self, args: Value) -> Value {
            json!({"status": "success", "echoed": args})
        }
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_document_not_err() {
        let registry = ToolRegistry::new();
        let result = registry.invoke("nope", json!({})).await;
        assert_eq!(result["status"], "error");
        assert!(result["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn registered_tool_is_invocable_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let result = registry.invoke("echo", json!({"x": 1})).await;
        assert_eq!(result["status"], "success");
    }

    #[test]
    fn required_str_rejects_missing_field() {
        let err = required_str(&json!({}), "query").unwrap_err();
        assert_eq!(err["status"], "error");
    }

    #[test]
    fn default_registry_has_all_seven_tools() {
        let registry = build_default_registry(&AppConfig::default());
        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "fetch_pdf_content",
                "fetch_tw_law_content",
                "fetch_webpage",
                "search_eu_laws",
                "search_jp_laws",
                "search_tw_laws",
                "web_search",
            ]
        );
    }
}
