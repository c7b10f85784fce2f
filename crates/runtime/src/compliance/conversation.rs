//! Per-session sliding-window conversation memory (spec.md §4.6).
//!
//! Distinct from `reasoning::conversation::Conversation`, which builds
//! the Researcher/Validator's internal LLM message history for a single
//! tool-calling exchange. This type is the UI-facing memory of what a
//! user and the system said to each other across turns within a
//! session, ported from `utils/conversation.py`.

use crate::compliance::types::{ConversationTurn, TurnRole};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_MAX_ROUNDS: usize = 10;
const TRUNCATE_ASSISTANT_AT: usize = 500;
const TRUNCATION_MARKER: &str = "...(content truncated)";

struct SessionWindow {
    turns: Vec<ConversationTurn>,
    max_rounds: usize,
}

impl SessionWindow {
    fn new(max_rounds: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_rounds,
        }
    }

    fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
        let cap = self.max_rounds * 2;
        if self.turns.len() > cap {
            let excess = self.turns.len() - cap;
            self.turns.drain(0..excess);
        }
    }
}

/// Keyed by session id; each session's window is mutated only by that
/// session's own request handler, so a `DashMap` shard lock is enough —
/// there is no cross-session sharing to serialize further.
#[derive(Clone)]
pub struct ConversationMemory {
    sessions: Arc<DashMap<String, SessionWindow>>,
    max_rounds: usize,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::with_max_rounds(DEFAULT_MAX_ROUNDS)
    }

    pub fn with_max_rounds(max_rounds: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_rounds,
        }
    }

    pub fn add_user_message(&self, session_id: &str, content: impl Into<String>) {
        self.push(session_id, TurnRole::User, content.into(), HashMap::new());
    }

    pub fn add_assistant_message(&self, session_id: &str, content: impl Into<String>) {
        self.push(
            session_id,
            TurnRole::Assistant,
            content.into(),
            HashMap::new(),
        );
    }

    pub fn add_assistant_message_with_metadata(
        &self,
        session_id: &str,
        content: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        self.push(session_id, TurnRole::Assistant, content.into(), metadata);
    }

    fn push(
        &self,
        session_id: &str,
        role: TurnRole,
        content: String,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        let mut window = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionWindow::new(self.max_rounds));
        window.push(ConversationTurn {
            role,
            content,
            timestamp: Utc::now(),
            metadata,
        });
    }

    pub fn len(&self, session_id: &str) -> usize {
        self.sessions.get(session_id).map_or(0, |w| w.turns.len())
    }

    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }

    pub fn clear(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// `"[User|Assistant]: <content>\n\n..."`, truncating any single
    /// assistant message past 500 chars with an explicit marker.
    pub fn format(&self, session_id: &str) -> Option<String> {
        let window = self.sessions.get(session_id)?;
        if window.turns.is_empty() {
            return None;
        }
        let rendered: Vec<String> = window
            .turns
            .iter()
            .map(|t| {
                let label = match t.role {
                    TurnRole::User => "User",
                    TurnRole::Assistant => "Assistant",
                };
                let content = if t.role == TurnRole::Assistant
                    && t.content.chars().count() > TRUNCATE_ASSISTANT_AT
                {
                    let head: String = t.content.chars().take(TRUNCATE_ASSISTANT_AT).collect();
                    format!("{head}{TRUNCATION_MARKER}")
                } else {
                    t.content.clone()
                };
                format!("[{label}]: {content}")
            })
            .collect();
        Some(rendered.join("\n\n"))
    }

    /// Scans backward for the last assistant turn carrying metadata —
    /// used to detect a follow-up query ("any others?") against the
    /// previous result.
    pub fn last_assistant_with_metadata(&self, session_id: &str) -> Option<ConversationTurn> {
        let window = self.sessions.get(session_id)?;
        window
            .turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::Assistant && !t.metadata.is_empty())
            .cloned()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_caps_at_2n_entries() {
        let memory = ConversationMemory::with_max_rounds(2);
        for i in 0..10 {
            memory.add_user_message("s1", format!("msg {i}"));
        }
        assert_eq!(memory.len("s1"), 4);
    }

    #[test]
    fn retained_entries_are_the_most_recent() {
        let memory = ConversationMemory::with_max_rounds(1);
        memory.add_user_message("s1", "first");
        memory.add_assistant_message("s1", "second");
        memory.add_user_message("s1", "third");
        memory.add_assistant_message("s1", "fourth");
        let formatted = memory.format("s1").unwrap();
        assert!(!formatted.contains("first"));
        assert!(formatted.contains("third"));
        assert!(formatted.contains("fourth"));
    }

    #[test]
    fn long_assistant_message_is_truncated_with_marker() {
        let memory = ConversationMemory::new();
        memory.add_assistant_message("s1", "x".repeat(600));
        let formatted = memory.format("s1").unwrap();
        assert!(formatted.contains("...(content truncated)"));
    }

    #[test]
    fn sessions_do_not_share_state() {
        let memory = ConversationMemory::new();
        memory.add_user_message("a", "hello a");
        memory.add_user_message("b", "hello b");
        assert_eq!(memory.len("a"), 1);
        assert_eq!(memory.len("b"), 1);
    }

    #[test]
    fn empty_session_formats_to_none() {
        let memory = ConversationMemory::new();
        assert!(memory.format("missing").is_none());
    }
}
