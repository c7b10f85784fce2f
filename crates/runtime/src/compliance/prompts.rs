//! System-prompt asset loading, ported from `utils/config.py: load_prompt`.
//!
//! Each node loads its own system prompt from `{prompts_dir}/{name}.md` at
//! construction time; a missing file falls back to a built-in default so a
//! fresh checkout runs without external assets.

use std::path::Path;

pub const PLANNER: &str = "planner";
pub const RESEARCHER: &str = "researcher";
pub const VALIDATOR: &str = "validator";

const DEFAULT_PLANNER: &str = include_str!("../../../../../config/prompts/planner.md");
const DEFAULT_RESEARCHER: &str = include_str!("../../../../../config/prompts/researcher.md");
const DEFAULT_VALIDATOR: &str = include_str!("../../../../../config/prompts/validator.md");

pub fn load(prompts_dir: &Path, name: &str) -> String {
    let path = prompts_dir.join(format!("{name}.md"));
    match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => {
            tracing::debug!(name, path = %path.display(), "prompt asset not found, using built-in default");
            default_for(name).to_string()
        }
    }
}

fn default_for(name: &str) -> &'static str {
    match name {
        PLANNER => DEFAULT_PLANNER,
        RESEARCHER => DEFAULT_RESEARCHER,
        VALIDATOR => DEFAULT_VALIDATOR,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_falls_back_to_builtin_default() {
        let content = load(Path::new("/nonexistent/prompts/dir"), PLANNER);
        assert_eq!(content, DEFAULT_PLANNER);
        assert!(!content.is_empty());
    }

    #[test]
    fn unknown_name_falls_back_to_empty_string() {
        let content = load(Path::new("/nonexistent"), "made_up_node");
        assert_eq!(content, "");
    }
}
