//! Pulls a JSON document out of a raw LLM response. Structured-output
//! requests sometimes still come back wrapped in a fenced code block
//! even under schema constraints (provider-specific fallback paths).
//!
//! Fallback order: a ```json```-tagged fence, then any fence, then the
//! bare content. This order must not change — upstream prompts rely on
//! it.

/// Extracts the most likely JSON payload from `content`.
pub fn extract_json(content: &str) -> &str {
    if let Some(body) = fenced_block(content, Some("json")) {
        return body;
    }
    if let Some(body) = fenced_block(content, None) {
        return body;
    }
    content.trim()
}

fn fenced_block<'a>(content: &'a str, tag: Option<&str>) -> Option<&'a str> {
    let marker = match tag {
        Some(tag) => format!("```{tag}"),
        None => "```".to_string(),
    };
    let start = content.find(&marker)? + marker.len();
    let rest = &content[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_json_tagged_fence() {
        let content = "here you go:\n```json\n{\"a\":1}\n```\nthanks";
        assert_eq!(extract_json(content), "{\"a\":1}");
    }

    #[test]
    fn falls_back_to_any_fence() {
        let content = "```\n{\"a\":2}\n```";
        assert_eq!(extract_json(content), "{\"a\":2}");
    }

    #[test]
    fn falls_back_to_bare_content() {
        let content = "  {\"a\":3}  ";
        assert_eq!(extract_json(content), "{\"a\":3}");
    }

    #[test]
    fn json_tagged_fence_wins_over_untagged_fence_earlier_in_text() {
        let content = "```\nnot this\n```\n```json\n{\"a\":4}\n```";
        assert_eq!(extract_json(content), "{\"a\":4}");
    }
}
