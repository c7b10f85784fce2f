//! Error taxonomy for the compliance query engine.
//!
//! Layered the way `types::error::RuntimeError` layers the agent runtime's
//! errors: one aggregator with a `#[from]` variant per leaf kind.

use thiserror::Error;

/// Top-level error returned by any compliance-engine operation.
#[derive(Error, Debug, Clone)]
pub enum ComplianceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM provider error: {0}")]
    RemoteLlm(#[from] RemoteLlmError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("cancelled: {0}")]
    Cancellation(#[from] CancellationError),
}

/// Missing or malformed required configuration. Fatal for the affected
/// entry point; surfaced at startup.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse config: {0}")]
    ParseFailure(String),
}

/// LLM provider call failed or returned empty content.
#[derive(Error, Debug, Clone)]
pub enum RemoteLlmError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("empty response from provider")]
    EmptyResponse,

    #[error("request timed out")]
    Timeout,
}

/// LLM response was not decodable as the required JSON shape.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoJsonFound,

    #[error("JSON decode failed: {0}")]
    InvalidJson(String),

    #[error("missing required field in parsed report: {0}")]
    MissingField(String),
}

/// HTTP/URL failure, including URL-Guard rejection, timeout, non-2xx.
/// Per-item — recorded on the offending `FoundItem` and never aborts the
/// Researcher loop.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("blocked by URL guard: {0}")]
    UrlGuardRejected(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("non-success status: {0}")]
    BadStatus(u16),

    #[error("exceeded max redirects")]
    TooManyRedirects,
}

/// Unknown tool name, bad arguments, or internal tool exception. Always
/// converted into a `{status: "error"}` tool result before reaching the
/// LLM — this variant exists for the internal call path and logging.
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// Persistent-store I/O failure. Bubbles to the caller; the query fails
/// with a visible error event.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Reserved: caller abort. Must unwind cleanly, releasing any temp files.
/// No code path constructs this today; it exists so the taxonomy and its
/// `#[from]` wiring compile and are ready for a future cancellation signal.
#[derive(Error, Debug, Clone)]
pub enum CancellationError {
    #[error("operation cancelled: {0}")]
    Aborted(String),
}

pub type ComplianceResult<T> = Result<T, ComplianceError>;

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<crate::reasoning::inference::InferenceError> for ComplianceError {
    fn from(e: crate::reasoning::inference::InferenceError) -> Self {
        use crate::reasoning::inference::InferenceError as IE;
        ComplianceError::RemoteLlm(match e {
            IE::RateLimited { retry_after_ms } => RemoteLlmError::RateLimited { retry_after_ms },
            IE::Timeout(_) => RemoteLlmError::Timeout,
            other => RemoteLlmError::Provider(other.to_string()),
        })
    }
}
