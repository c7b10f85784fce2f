//! Unified LLM inference
//!
//! Provides multi-turn conversation management and a provider-agnostic
//! inference trait used by the compliance query engine's graph nodes.

pub mod conversation;
pub mod inference;
pub mod providers;

pub use conversation::{Conversation, ConversationMessage, MessageRole};
pub use inference::{
    InferenceOptions, InferenceProvider, InferenceResponse, ResponseFormat, ToolDefinition, Usage,
};
